use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

use chatterbox_shared::ChatError;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Chat(#[from] ChatError),

    #[error("Missing or empty x-user-id header")]
    Unauthenticated,
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Unauthenticated => StatusCode::UNAUTHORIZED,
            ServerError::Chat(err) => match err {
                ChatError::NotFound(_) | ChatError::ChannelNotFound(_) => StatusCode::NOT_FOUND,
                ChatError::Unauthorized(_) | ChatError::Forbidden(_) => StatusCode::FORBIDDEN,
                ChatError::DuplicateRequest(_)
                | ChatError::AlreadyExists(_)
                | ChatError::AlreadyMember(_)
                | ChatError::AlreadyFriends(_) => StatusCode::CONFLICT,
                ChatError::SelfReference(_) | ChatError::InvalidInput(_) => {
                    StatusCode::BAD_REQUEST
                }
                ChatError::Infrastructure(_) => StatusCode::SERVICE_UNAVAILABLE,
            },
        }
    }

    /// Machine-readable kind, returned next to the message.
    pub fn kind(&self) -> &'static str {
        match self {
            ServerError::Chat(err) => err.kind(),
            ServerError::Unauthenticated => "unauthenticated",
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            // Store internals stay in the logs.
            ServerError::Chat(ChatError::Infrastructure(detail)) => {
                tracing::error!(error = %detail, "infrastructure failure");
                "Service temporarily unavailable".to_string()
            }
            _ => self.to_string(),
        };

        let body = serde_json::json!({
            "error": message,
            "kind": self.kind(),
        });

        (status, axum::Json(body)).into_response()
    }
}
