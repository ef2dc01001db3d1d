use serde::{Deserialize, Serialize};

use crate::constants::{
    EVENT_INCOMING_FRIEND_REQUESTS, EVENT_INCOMING_GROUP_REQUESTS, EVENT_INCOMING_MESSAGE,
    EVENT_NEW_FRIEND, EVENT_NEW_GROUP, EVENT_NEW_GROUP_MEMBER, EVENT_NEW_MESSAGE,
};
use crate::topics::Topic;
use crate::types::{Group, GroupName, Message, User, UserId};

/// Someone asked to become the receiver's friend
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct FriendRequestPayload {
    pub sender_id: UserId,
    pub sender_email: String,
}

/// A pending join request for a group the receiver administers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GroupRequestPayload {
    pub sender_id: UserId,
    pub sender_email: String,
    pub group_name: GroupName,
}

/// A user joined a group the receiver belongs to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GroupMemberPayload {
    pub group_name: GroupName,
    pub member: User,
}

/// Direct message as delivered to the recipient's chat list, with enough
/// sender metadata to render a preview toast.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ChatPreview {
    #[serde(flatten)]
    pub message: Message,
    pub sender_img: String,
    pub sender_name: String,
}

/// All live events published to topics
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", content = "data")]
pub enum Event {
    #[serde(rename = "incoming_friend_requests")]
    IncomingFriendRequest(FriendRequestPayload),

    /// Carries the counterpart's record
    #[serde(rename = "new_friend")]
    NewFriend(User),

    #[serde(rename = "incoming_group_requests")]
    IncomingGroupRequest(GroupRequestPayload),

    /// Sent to a user who was just admitted
    #[serde(rename = "new_group")]
    NewGroup(Group),

    /// Sent to the members who were already in the group
    #[serde(rename = "new_group_member")]
    NewGroupMember(GroupMemberPayload),

    /// Full message on the channel topic
    #[serde(rename = "incoming-message")]
    IncomingMessage(Message),

    /// Preview on the recipient's chats topic
    #[serde(rename = "new_message")]
    NewMessage(ChatPreview),
}

impl Event {
    pub fn name(&self) -> &'static str {
        match self {
            Event::IncomingFriendRequest(_) => EVENT_INCOMING_FRIEND_REQUESTS,
            Event::NewFriend(_) => EVENT_NEW_FRIEND,
            Event::IncomingGroupRequest(_) => EVENT_INCOMING_GROUP_REQUESTS,
            Event::NewGroup(_) => EVENT_NEW_GROUP,
            Event::NewGroupMember(_) => EVENT_NEW_GROUP_MEMBER,
            Event::IncomingMessage(_) => EVENT_INCOMING_MESSAGE,
            Event::NewMessage(_) => EVENT_NEW_MESSAGE,
        }
    }
}

/// An event together with the topic it was published on
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Envelope {
    pub topic: Topic,
    #[serde(flatten)]
    pub event: Event,
}

/// Authoritative state handed to a viewer when a session starts
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub user: User,
    pub friends: Vec<User>,
    pub groups: Vec<Group>,
    /// Size of the viewer's incoming friend-request set
    pub unseen_friend_requests: usize,
    /// Pending join requests summed over the groups the viewer administers
    pub unseen_group_requests: usize,
}
