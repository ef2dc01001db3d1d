use std::sync::Arc;

use axum::{
    extract::{ws::WebSocketUpgrade, Path, Query, State},
    http::{HeaderMap, Method},
    response::Response,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

use chatterbox_net::LocalRelay;
use chatterbox_shared::protocol::{FriendRequestPayload, GroupRequestPayload, SessionSnapshot};
use chatterbox_shared::topics::Topic;
use chatterbox_shared::types::{ChannelKey, Group, GroupName, Message, User, UserId};
use chatterbox_store::Store;

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::fanout::Fanout;
use crate::live::{self, LiveFeed};
use crate::messaging::MessagingEngine;
use crate::relations::Relations;
use crate::requests::RequestEngine;

/// Header set by the identity gateway in front of this service.
pub const USER_ID_HEADER: &str = "x-user-id";

#[derive(Clone)]
pub struct AppState {
    pub relations: Relations,
    pub requests: RequestEngine,
    pub messaging: MessagingEngine,
    /// Engines publish into it; `/ws` viewers subscribe from it.
    pub relay: LocalRelay,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, relay: LocalRelay, config: ServerConfig) -> Self {
        let relations = Relations::new(store);
        let fanout = Fanout::new(Arc::new(relay.clone()));
        Self {
            requests: RequestEngine::new(relations.clone(), fanout.clone()),
            messaging: MessagingEngine::new(relations.clone(), fanout, config.max_message_len),
            relations,
            relay,
            config: Arc::new(config),
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/me", get(session_snapshot))
        .route("/groups", post(create_group))
        .route("/groups/invite", post(invite_to_group))
        .route("/groups/join", post(join_group))
        .route("/groups/accept", post(accept_group_request))
        .route("/groups/deny", post(deny_group_request))
        .route("/groups/requests", get(group_requests))
        .route("/groups/:name/members", get(group_members))
        .route("/friends/add", post(add_friend))
        .route("/friends/accept", post(accept_friend))
        .route("/friends/deny", post(deny_friend))
        .route("/friends/requests", get(friend_requests))
        .route("/messages", post(post_message))
        .route("/channels/:key/messages", get(channel_history))
        .route("/ws", get(live_events))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    name: String,
    version: &'static str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupBody {
    group_name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct InviteBody {
    group_name: String,
    email: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupDecisionBody {
    group_name: String,
    candidate_id: UserId,
}

#[derive(Deserialize)]
struct EmailBody {
    email: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct FriendDecisionBody {
    sender_id: UserId,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PostMessageBody {
    channel_key: String,
    text: String,
    timestamp: Option<i64>,
}

#[derive(Deserialize)]
struct HistoryQuery {
    start: Option<i64>,
    end: Option<i64>,
}

#[derive(Deserialize)]
struct LiveQuery {
    channel: Option<String>,
}

fn caller(headers: &HeaderMap) -> Result<UserId, ServerError> {
    let id = headers
        .get(USER_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .unwrap_or("");
    if id.is_empty() {
        return Err(ServerError::Unauthenticated);
    }
    Ok(UserId::parse(id)?)
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        name: state.config.instance_name.clone(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn session_snapshot(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<SessionSnapshot>, ServerError> {
    let me = caller(&headers)?;
    Ok(Json(state.relations.session_snapshot(&me).await?))
}

async fn create_group(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(body): Json<GroupBody>,
) -> Result<Json<Group>, ServerError> {
    let me = caller(&headers)?;
    Ok(Json(state.requests.create_group(&me, &body.group_name).await?))
}

async fn invite_to_group(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(body): Json<InviteBody>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let me = caller(&headers)?;
    state
        .requests
        .propose_group_join_request(&me, &body.group_name, &body.email)
        .await?;
    Ok(Json(serde_json::json!({ "requested": true })))
}

async fn join_group(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(body): Json<GroupBody>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let me = caller(&headers)?;
    state
        .requests
        .request_to_join_group(&me, &body.group_name)
        .await?;
    Ok(Json(serde_json::json!({ "requested": true })))
}

async fn accept_group_request(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(body): Json<GroupDecisionBody>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let me = caller(&headers)?;
    state
        .requests
        .accept_group_join_request(&me, &body.group_name, &body.candidate_id)
        .await?;
    Ok(Json(serde_json::json!({ "accepted": true })))
}

async fn deny_group_request(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(body): Json<GroupDecisionBody>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let me = caller(&headers)?;
    state
        .requests
        .deny_group_join_request(&me, &body.group_name, &body.candidate_id)
        .await?;
    Ok(Json(serde_json::json!({ "denied": true })))
}

async fn group_requests(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<Vec<GroupRequestPayload>>, ServerError> {
    let me = caller(&headers)?;
    Ok(Json(state.relations.incoming_group_requests(&me).await?))
}

/// Members only.
async fn group_members(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<Vec<User>>, ServerError> {
    let me = caller(&headers)?;
    let group = GroupName::parse(&name)?;
    state
        .messaging
        .authorize_channel(&me, &ChannelKey::group(group.clone()))
        .await?;
    Ok(Json(state.relations.group_members(&group).await?))
}

async fn add_friend(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(body): Json<EmailBody>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let me = caller(&headers)?;
    state
        .requests
        .propose_friend_request(&me, &body.email)
        .await?;
    Ok(Json(serde_json::json!({ "requested": true })))
}

async fn accept_friend(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(body): Json<FriendDecisionBody>,
) -> Result<Json<User>, ServerError> {
    let me = caller(&headers)?;
    let friend = state
        .requests
        .accept_friend_request(&me, &body.sender_id)
        .await?;
    Ok(Json(friend))
}

async fn deny_friend(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(body): Json<FriendDecisionBody>,
) -> Result<Json<serde_json::Value>, ServerError> {
    let me = caller(&headers)?;
    state
        .requests
        .deny_friend_request(&me, &body.sender_id)
        .await?;
    Ok(Json(serde_json::json!({ "denied": true })))
}

async fn friend_requests(
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Result<Json<Vec<FriendRequestPayload>>, ServerError> {
    let me = caller(&headers)?;
    Ok(Json(state.relations.incoming_friend_requests(&me).await?))
}

async fn post_message(
    headers: HeaderMap,
    State(state): State<AppState>,
    Json(body): Json<PostMessageBody>,
) -> Result<Json<Message>, ServerError> {
    let me = caller(&headers)?;
    let channel = ChannelKey::parse(&body.channel_key)?;
    let message = state
        .messaging
        .post_message(&me, &channel, &body.text, body.timestamp)
        .await?;
    Ok(Json(message))
}

/// Newest first.
async fn channel_history(
    headers: HeaderMap,
    State(state): State<AppState>,
    Path(key): Path<String>,
    Query(range): Query<HistoryQuery>,
) -> Result<Json<Vec<Message>>, ServerError> {
    let me = caller(&headers)?;
    let channel = ChannelKey::parse(&key)?;
    state.messaging.authorize_channel(&me, &channel).await?;

    let history = state
        .messaging
        .fetch_channel_history_range(&channel, range.start.unwrap_or(0), range.end.unwrap_or(-1))
        .await?;
    debug!(channel = %history.channel(), viewer = %me, entries = history.len(), "history fetched");
    Ok(Json(history.to_vec()))
}

/// Upgrade to a WebSocket carrying every event addressed to the caller.
/// `?channel=` also follows one open channel, typically a direct chat.
async fn live_events(
    headers: HeaderMap,
    State(state): State<AppState>,
    Query(query): Query<LiveQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ServerError> {
    let me = caller(&headers)?;
    let snapshot = state.relations.session_snapshot(&me).await?;
    let mut feed = LiveFeed::open(&state.relay, &snapshot);
    if let Some(raw) = query.channel {
        let channel = ChannelKey::parse(&raw)?;
        state.messaging.authorize_channel(&me, &channel).await?;
        feed.follow(Topic::channel(&channel));
    }
    Ok(ws.on_upgrade(move |socket| live::run(socket, feed)))
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
