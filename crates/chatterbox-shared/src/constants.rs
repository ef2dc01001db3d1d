/// Application name
pub const APP_NAME: &str = "ChatterBox";

/// Default maximum message length, in characters
pub const DEFAULT_MAX_MESSAGE_LEN: usize = 2000;

/// Maximum group name length, in characters
pub const MAX_GROUP_NAME_LEN: usize = 64;

/// Joins the two user ids of a direct channel key (`u1--u2`)
pub const DIRECT_KEY_SEPARATOR: &str = "--";

/// Topic separator as seen by the push transport (`user:u1:chats` -> `user__u1__chats`)
pub const WIRE_TOPIC_SEPARATOR: &str = "__";

/// Default HTTP API port (server)
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Event names, as seen by subscribers
pub const EVENT_INCOMING_FRIEND_REQUESTS: &str = "incoming_friend_requests";
pub const EVENT_NEW_FRIEND: &str = "new_friend";
pub const EVENT_INCOMING_GROUP_REQUESTS: &str = "incoming_group_requests";
pub const EVENT_NEW_GROUP: &str = "new_group";
pub const EVENT_NEW_GROUP_MEMBER: &str = "new_group_member";
pub const EVENT_INCOMING_MESSAGE: &str = "incoming-message";
pub const EVENT_NEW_MESSAGE: &str = "new_message";
