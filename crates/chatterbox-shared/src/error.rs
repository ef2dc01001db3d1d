use thiserror::Error;

/// Every way a coordination operation can be rejected.
///
/// All variants except [`ChatError::Infrastructure`] are domain errors: they
/// are terminal for the request and leave the store untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChatError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Duplicate request: {0}")]
    DuplicateRequest(String),

    #[error("Already exists: {0}")]
    AlreadyExists(String),

    #[error("Already a member: {0}")]
    AlreadyMember(String),

    #[error("Already friends: {0}")]
    AlreadyFriends(String),

    #[error("Cannot target yourself: {0}")]
    SelfReference(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Channel not found: {0}")]
    ChannelNotFound(String),

    /// Store or relay unavailable. Callers may retry.
    #[error("Infrastructure error: {0}")]
    Infrastructure(String),
}

impl ChatError {
    /// Only infrastructure failures are worth retrying.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ChatError::Infrastructure(_))
    }

    /// Stable, machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            ChatError::NotFound(_) => "not_found",
            ChatError::Unauthorized(_) => "unauthorized",
            ChatError::Forbidden(_) => "forbidden",
            ChatError::DuplicateRequest(_) => "duplicate_request",
            ChatError::AlreadyExists(_) => "already_exists",
            ChatError::AlreadyMember(_) => "already_member",
            ChatError::AlreadyFriends(_) => "already_friends",
            ChatError::SelfReference(_) => "self_reference",
            ChatError::InvalidInput(_) => "invalid_input",
            ChatError::ChannelNotFound(_) => "channel_not_found",
            ChatError::Infrastructure(_) => "infrastructure",
        }
    }
}

/// Convenience alias used by the engines.
pub type Result<T> = std::result::Result<T, ChatError>;
