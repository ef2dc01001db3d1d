use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{DIRECT_KEY_SEPARATOR, MAX_GROUP_NAME_LEN};
use crate::error::ChatError;

// User identity, as issued by the external identity provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct UserId(pub String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Validate an id handed in from outside. Ids are non-empty and may not
    /// contain the direct channel key separator, so every pair of ids maps to
    /// a key that parses back to the same pair.
    pub fn parse(raw: &str) -> Result<Self, ChatError> {
        let id = raw.trim();
        if id.is_empty() {
            return Err(ChatError::InvalidInput("user id is empty".into()));
        }
        if id.contains(DIRECT_KEY_SEPARATOR) {
            return Err(ChatError::InvalidInput(format!(
                "user id '{id}' may not contain '{DIRECT_KEY_SEPARATOR}'"
            )));
        }
        Ok(Self(id.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UserId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Unique, immutable group identifier.
///
/// 1..=64 characters of ASCII alphanumerics, `-` and `_`. The sequence `--`
/// is reserved for direct channel keys and therefore rejected.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct GroupName(String);

impl GroupName {
    pub fn parse(raw: &str) -> Result<Self, ChatError> {
        let name = raw.trim();
        if name.is_empty() {
            return Err(ChatError::InvalidInput("group name is empty".into()));
        }
        if name.chars().count() > MAX_GROUP_NAME_LEN {
            return Err(ChatError::InvalidInput(format!(
                "group name longer than {MAX_GROUP_NAME_LEN} characters"
            )));
        }
        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ChatError::InvalidInput(format!(
                "group name '{name}' may only contain letters, digits, '-' and '_'"
            )));
        }
        if name.contains(DIRECT_KEY_SEPARATOR) {
            return Err(ChatError::InvalidInput(format!(
                "group name '{name}' may not contain '{DIRECT_KEY_SEPARATOR}'"
            )));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for GroupName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for GroupName {
    type Error = ChatError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<GroupName> for String {
    fn from(name: GroupName) -> Self {
        name.0
    }
}

/// Immutable identity record. Provisioned externally, read-only here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: String,
    pub image: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Group {
    pub name: GroupName,
}

/// A chat message as stored in a channel log.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub sender_id: UserId,
    pub text: String,
    /// Server-assigned, milliseconds since the Unix epoch.
    pub timestamp: i64,
}

/// Unit of message-log identity and authorization.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ChannelKey {
    /// Friend-pair conversation. Ids are kept sorted so the key does not
    /// depend on who is asking.
    Direct(UserId, UserId),
    Group(GroupName),
}

impl ChannelKey {
    /// Both ids are expected to have passed [`UserId::parse`].
    pub fn direct(a: &UserId, b: &UserId) -> Self {
        if a <= b {
            Self::Direct(a.clone(), b.clone())
        } else {
            Self::Direct(b.clone(), a.clone())
        }
    }

    pub fn group(name: GroupName) -> Self {
        Self::Group(name)
    }

    /// Parse the textual form: `a--b` for direct chats, the group name
    /// otherwise.
    pub fn parse(raw: &str) -> Result<Self, ChatError> {
        let raw = raw.trim();
        match raw.split_once(DIRECT_KEY_SEPARATOR) {
            Some((a, b)) => {
                let malformed =
                    |_: ChatError| ChatError::InvalidInput(format!("malformed direct channel key '{raw}'"));
                let a = UserId::parse(a).map_err(malformed)?;
                let b = UserId::parse(b).map_err(malformed)?;
                Ok(Self::direct(&a, &b))
            }
            None => Ok(Self::Group(GroupName::parse(raw)?)),
        }
    }

    /// Whether `user` is one of the two parties of a direct channel.
    /// Always `false` for group channels.
    pub fn involves(&self, user: &UserId) -> bool {
        match self {
            Self::Direct(a, b) => a == user || b == user,
            Self::Group(_) => false,
        }
    }

    /// The other party of a direct channel, seen from `viewer`.
    pub fn counterpart(&self, viewer: &UserId) -> Option<&UserId> {
        match self {
            Self::Direct(a, b) if a == viewer => Some(b),
            Self::Direct(a, b) if b == viewer => Some(a),
            _ => None,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, Self::Group(_))
    }
}

impl std::fmt::Display for ChannelKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Direct(a, b) => write!(f, "{a}{DIRECT_KEY_SEPARATOR}{b}"),
            Self::Group(name) => write!(f, "{name}"),
        }
    }
}

impl TryFrom<String> for ChannelKey {
    type Error = ChatError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ChannelKey> for String {
    fn from(key: ChannelKey) -> Self {
        key.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_key_is_order_independent() {
        let a = UserId::from("u1");
        let b = UserId::from("u2");
        assert_eq!(ChannelKey::direct(&a, &b), ChannelKey::direct(&b, &a));
        assert_eq!(ChannelKey::direct(&b, &a).to_string(), "u1--u2");
    }

    #[test]
    fn test_parse_channel_key() {
        let key = ChannelKey::parse("u2--u1").unwrap();
        assert_eq!(key, ChannelKey::direct(&"u1".into(), &"u2".into()));
        assert!(key.involves(&"u1".into()));
        assert_eq!(key.counterpart(&"u2".into()), Some(&UserId::from("u1")));

        let group = ChannelKey::parse("night-owls").unwrap();
        assert!(group.is_group());
        assert!(!group.involves(&"u1".into()));

        assert!(ChannelKey::parse("--u1").is_err());
        assert!(ChannelKey::parse("u1--").is_err());
        // A third id segment cannot come from two valid ids.
        assert!(ChannelKey::parse("u1--u2--u3").is_err());
    }

    #[test]
    fn test_user_id_rules() {
        assert_eq!(UserId::parse(" u1 ").unwrap(), UserId::from("u1"));
        assert!(UserId::parse("").is_err());
        assert!(UserId::parse("a--b").is_err());

        let (a, b) = (UserId::parse("a-1").unwrap(), UserId::parse("b-2").unwrap());
        let key = ChannelKey::direct(&a, &b);
        assert_eq!(ChannelKey::parse(&key.to_string()).unwrap(), key);
    }

    #[test]
    fn test_group_name_rules() {
        assert!(GroupName::parse("night-owls").is_ok());
        assert!(GroupName::parse("night_owls_2").is_ok());
        assert!(GroupName::parse("").is_err());
        assert!(GroupName::parse("night owls").is_err());
        assert!(GroupName::parse("night--owls").is_err());
        assert!(GroupName::parse(&"x".repeat(65)).is_err());
    }

    #[test]
    fn test_message_json_shape() {
        let msg = Message {
            id: Uuid::nil(),
            sender_id: "u1".into(),
            text: "hi".into(),
            timestamp: 42,
        };
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["senderId"], "u1");
        assert_eq!(json["timestamp"], 42);
    }
}
