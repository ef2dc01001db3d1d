//! Unseen-activity aggregator.
//!
//! One [`UnseenActivity`] per viewer session. It starts from the
//! authoritative [`SessionSnapshot`] and is then driven purely by live
//! events and navigation. Counters are best-effort: events missed while
//! disconnected are only reconciled by the next session's snapshot.

use std::collections::HashMap;

use tracing::{debug, trace};

use chatterbox_shared::protocol::{ChatPreview, Envelope, Event, SessionSnapshot};
use chatterbox_shared::types::{ChannelKey, Group, Message, User, UserId};

use crate::events::Outcome;

/// The page the viewer currently has open.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Dashboard,
    FriendRequests,
    GroupRequests,
    Chat(ChannelKey),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Friend,
    Group,
}

#[derive(Debug, Clone)]
pub struct UnseenActivity {
    viewer: UserId,
    view: View,
    friend_requests: usize,
    group_requests: usize,
    unseen_messages: HashMap<ChannelKey, usize>,
    friends: Vec<User>,
    groups: Vec<Group>,
    /// Messages of the open channel, newest first.
    history: Vec<Message>,
}

impl UnseenActivity {
    pub fn from_snapshot(snapshot: SessionSnapshot) -> Self {
        let mut activity = Self {
            viewer: snapshot.user.id,
            view: View::Dashboard,
            friend_requests: snapshot.unseen_friend_requests,
            group_requests: snapshot.unseen_group_requests,
            unseen_messages: HashMap::new(),
            friends: snapshot.friends,
            groups: snapshot.groups,
            history: Vec::new(),
        };
        sort_friends(&mut activity.friends);
        activity.groups.sort_by(|a, b| a.name.cmp(&b.name));
        activity.groups.dedup();
        activity
    }

    /// Fold one live event into the counters and lists.
    pub fn apply(&mut self, envelope: &Envelope) -> Outcome {
        trace!(topic = %envelope.topic, event = envelope.event.name(), "applying event");
        match &envelope.event {
            Event::IncomingFriendRequest(_) => {
                if self.view == View::FriendRequests {
                    return Outcome::Suppressed;
                }
                self.friend_requests += 1;
                Outcome::Counted
            }
            Event::IncomingGroupRequest(_) => {
                if self.view == View::GroupRequests {
                    return Outcome::Suppressed;
                }
                self.group_requests += 1;
                Outcome::Counted
            }
            Event::NewFriend(user) => {
                if self.friends.iter().any(|f| f.id == user.id) {
                    return Outcome::Ignored;
                }
                self.friends.push(user.clone());
                sort_friends(&mut self.friends);
                Outcome::RosterUpdated
            }
            Event::NewGroup(group) => {
                if self.groups.contains(group) {
                    return Outcome::Ignored;
                }
                self.groups.push(group.clone());
                self.groups.sort_by(|a, b| a.name.cmp(&b.name));
                Outcome::RosterUpdated
            }
            // Member lists are fetched when a group page is opened.
            Event::NewGroupMember(_) => Outcome::Ignored,
            Event::NewMessage(preview) => self.apply_preview(preview),
            Event::IncomingMessage(message) => match envelope.topic.channel_key() {
                Some(channel) => self.apply_message(channel, message),
                None => Outcome::Ignored,
            },
        }
    }

    fn apply_preview(&mut self, preview: &ChatPreview) -> Outcome {
        let sender = &preview.message.sender_id;
        if sender == &self.viewer {
            return Outcome::Ignored;
        }
        let channel = ChannelKey::direct(&self.viewer, sender);
        if self.view == View::Chat(channel.clone()) {
            // The channel topic delivers it into the open history.
            return Outcome::Suppressed;
        }
        *self.unseen_messages.entry(channel).or_default() += 1;
        Outcome::Notify(preview.clone())
    }

    fn apply_message(&mut self, channel: ChannelKey, message: &Message) -> Outcome {
        if self.view == View::Chat(channel.clone()) {
            if self.history.iter().any(|m| m.id == message.id) {
                return Outcome::Ignored;
            }
            self.history.insert(0, message.clone());
            return Outcome::Displayed(message.clone());
        }
        if !channel.is_group() || message.sender_id == self.viewer {
            // Direct messages are counted from the chats-topic preview.
            return Outcome::Ignored;
        }
        *self.unseen_messages.entry(channel).or_default() += 1;
        Outcome::Counted
    }

    /// Switch pages. The counter that belongs to the new page is cleared and
    /// `history` (newest first) becomes the visible message list.
    pub fn navigate(&mut self, view: View, history: Vec<Message>) {
        match &view {
            View::Dashboard => {}
            View::FriendRequests => self.friend_requests = 0,
            View::GroupRequests => self.group_requests = 0,
            View::Chat(channel) => {
                self.unseen_messages.remove(channel);
            }
        }
        debug!(viewer = %self.viewer, view = ?view, "navigated");
        self.history = match view {
            View::Chat(_) => history,
            _ => Vec::new(),
        };
        self.view = view;
    }

    /// The viewer accepted or denied a request of this family.
    pub fn request_resolved(&mut self, kind: RequestKind) {
        match kind {
            RequestKind::Friend => self.friend_requests = 0,
            RequestKind::Group => self.group_requests = 0,
        }
    }

    pub fn viewer(&self) -> &UserId {
        &self.viewer
    }

    pub fn view(&self) -> &View {
        &self.view
    }

    pub fn unseen_friend_requests(&self) -> usize {
        self.friend_requests
    }

    pub fn unseen_group_requests(&self) -> usize {
        self.group_requests
    }

    pub fn unseen_messages(&self, channel: &ChannelKey) -> usize {
        self.unseen_messages.get(channel).copied().unwrap_or(0)
    }

    pub fn total_unseen_messages(&self) -> usize {
        self.unseen_messages.values().sum()
    }

    /// Sidebar order: display name, then id.
    pub fn friends(&self) -> &[User] {
        &self.friends
    }

    /// Sidebar order: group name.
    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn history(&self) -> &[Message] {
        &self.history
    }
}

fn sort_friends(friends: &mut Vec<User>) {
    friends.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
    friends.dedup_by(|a, b| a.id == b.id);
}
