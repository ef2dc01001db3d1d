//! Topic naming for live event delivery.
//!
//! A topic is a deterministic function of `(scope, id, subtype)`: either a
//! per-user topic (`user:{id}:{subtype}`) or a per-channel topic
//! (`chat:{channel}`).

use serde::{Deserialize, Serialize};

use crate::constants::WIRE_TOPIC_SEPARATOR;
use crate::types::{ChannelKey, UserId};

const CHANNEL_PREFIX: &str = "chat:";

/// Per-user topic subtypes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UserTopic {
    FriendRequests,
    Friends,
    GroupRequests,
    Groups,
    /// Direct-message previews for the chat list.
    Chats,
}

impl UserTopic {
    pub const ALL: [UserTopic; 5] = [
        UserTopic::FriendRequests,
        UserTopic::Friends,
        UserTopic::GroupRequests,
        UserTopic::Groups,
        UserTopic::Chats,
    ];

    fn suffix(self) -> &'static str {
        match self {
            UserTopic::FriendRequests => "incoming_friend_requests",
            UserTopic::Friends => "friends",
            UserTopic::GroupRequests => "incoming_group_requests",
            UserTopic::Groups => "groups",
            UserTopic::Chats => "chats",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topic(String);

impl Topic {
    pub fn user(id: &UserId, subtype: UserTopic) -> Self {
        Self(format!("user:{id}:{}", subtype.suffix()))
    }

    pub fn channel(key: &ChannelKey) -> Self {
        Self(format!("{CHANNEL_PREFIX}{key}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Form used by the push transport, which does not accept `:`.
    pub fn to_wire(&self) -> String {
        self.0.replace(':', WIRE_TOPIC_SEPARATOR)
    }

    /// The channel this topic carries, if it is a channel topic.
    pub fn channel_key(&self) -> Option<ChannelKey> {
        self.0
            .strip_prefix(CHANNEL_PREFIX)
            .and_then(|raw| ChannelKey::parse(raw).ok())
    }
}

impl std::fmt::Display for Topic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::GroupName;

    #[test]
    fn test_user_topics() {
        let id = UserId::from("u1");
        assert_eq!(
            Topic::user(&id, UserTopic::FriendRequests).as_str(),
            "user:u1:incoming_friend_requests"
        );
        assert_eq!(Topic::user(&id, UserTopic::Chats).to_wire(), "user__u1__chats");
    }

    #[test]
    fn test_channel_topic_round_trip() {
        let key = ChannelKey::group(GroupName::parse("night-owls").unwrap());
        let topic = Topic::channel(&key);
        assert_eq!(topic.as_str(), "chat:night-owls");
        assert_eq!(topic.channel_key(), Some(key));

        let user_topic = Topic::user(&"u1".into(), UserTopic::Friends);
        assert_eq!(user_topic.channel_key(), None);
    }
}
