//! Store key layout.
//!
//! | Key | Shape | Holds |
//! |---|---|---|
//! | `user:{id}` | value | JSON [`User`](chatterbox_shared::types::User) record |
//! | `user:email:{email}` | value | user id |
//! | `user:{id}:friends` | set | friend ids |
//! | `user:{id}:incoming_friend_requests` | set | ids of pending senders |
//! | `user:{id}:groups` | set | names of joined groups |
//! | `groups` | set | every group name ever created |
//! | `group:{name}:group-members` | set | member ids |
//! | `group:{name}:group-admins` | set | admin ids |
//! | `group:{name}:incoming_group_requests` | set | ids with a pending join |
//! | `chat:{channel}:messages` | sorted set | JSON messages scored by timestamp |

use chatterbox_shared::types::{ChannelKey, GroupName, UserId};

pub const GROUP_REGISTRY: &str = "groups";

pub fn user(id: &UserId) -> String {
    format!("user:{id}")
}

pub fn user_by_email(email: &str) -> String {
    format!("user:email:{email}")
}

pub fn friends(id: &UserId) -> String {
    format!("user:{id}:friends")
}

pub fn incoming_friend_requests(id: &UserId) -> String {
    format!("user:{id}:incoming_friend_requests")
}

pub fn user_groups(id: &UserId) -> String {
    format!("user:{id}:groups")
}

pub fn group_members(name: &GroupName) -> String {
    format!("group:{name}:group-members")
}

pub fn group_admins(name: &GroupName) -> String {
    format!("group:{name}:group-admins")
}

pub fn group_requests(name: &GroupName) -> String {
    format!("group:{name}:incoming_group_requests")
}

pub fn messages(channel: &ChannelKey) -> String {
    format!("chat:{channel}:messages")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_formats() {
        let id = UserId::from("u1");
        let group = GroupName::parse("night-owls").unwrap();
        assert_eq!(incoming_friend_requests(&id), "user:u1:incoming_friend_requests");
        assert_eq!(group_members(&group), "group:night-owls:group-members");
        assert_eq!(
            messages(&ChannelKey::direct(&"u2".into(), &id)),
            "chat:u1--u2:messages"
        );
    }
}
