//! Messaging engine: channel authorization, posting and history.
//!
//! A channel's log is a sorted set of JSON messages scored by the server
//! timestamp. Posts are authorized before anything is written, and nothing
//! is published for a post that was not persisted.

use std::sync::Arc;

use tracing::{debug, info, warn};
use uuid::Uuid;

use chatterbox_shared::error::{ChatError, Result};
use chatterbox_shared::protocol::{ChatPreview, Event};
use chatterbox_shared::topics::{Topic, UserTopic};
use chatterbox_shared::types::{ChannelKey, Message, UserId};

use crate::clock::MonotonicClock;
use crate::fanout::Fanout;
use crate::keys;
use crate::relations::Relations;

#[derive(Clone)]
pub struct MessagingEngine {
    relations: Relations,
    fanout: Fanout,
    clock: Arc<MonotonicClock>,
    max_message_len: usize,
}

impl MessagingEngine {
    pub fn new(relations: Relations, fanout: Fanout, max_message_len: usize) -> Self {
        Self {
            relations,
            fanout,
            clock: Arc::new(MonotonicClock::new()),
            max_message_len,
        }
    }

    /// Whether `user` may read from and post to `channel`.
    ///
    /// Group channels require membership. Direct channels require the user
    /// to be one of the two parties, and the parties to be friends.
    pub async fn authorize_channel(&self, user: &UserId, channel: &ChannelKey) -> Result<()> {
        match channel {
            ChannelKey::Group(group) => {
                if !self.relations.group_exists(group).await? {
                    return Err(ChatError::ChannelNotFound(format!(
                        "group '{group}' does not exist"
                    )));
                }
                if !self.relations.is_group_member(group, user).await? {
                    return Err(ChatError::Forbidden(format!(
                        "{user} is not a member of '{group}'"
                    )));
                }
            }
            ChannelKey::Direct(a, b) => {
                if !channel.involves(user) {
                    return Err(ChatError::Forbidden(format!(
                        "{user} is not a party of {channel}"
                    )));
                }
                if !self.relations.is_friend(a, b).await? {
                    return Err(ChatError::ChannelNotFound(format!(
                        "{a} and {b} are not friends"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Persist a message and fan it out.
    ///
    /// `client_timestamp` is only used for diagnostics; ordering always uses
    /// the server clock.
    pub async fn post_message(
        &self,
        sender: &UserId,
        channel: &ChannelKey,
        text: &str,
        client_timestamp: Option<i64>,
    ) -> Result<Message> {
        self.authorize_channel(sender, channel).await?;

        if text.trim().is_empty() {
            return Err(ChatError::InvalidInput("message text is empty".into()));
        }
        let len = text.chars().count();
        if len > self.max_message_len {
            return Err(ChatError::InvalidInput(format!(
                "message is {len} characters, the limit is {}",
                self.max_message_len
            )));
        }

        let sender_record = match channel {
            ChannelKey::Direct(..) => Some(self.relations.require_user(sender).await?),
            ChannelKey::Group(_) => None,
        };

        let message = Message {
            id: Uuid::new_v4(),
            sender_id: sender.clone(),
            text: text.to_string(),
            timestamp: self.clock.now_millis(),
        };
        if let Some(client) = client_timestamp {
            debug!(
                channel = %channel,
                skew_ms = message.timestamp.saturating_sub(client),
                "client clock skew"
            );
        }

        let json = serde_json::to_string(&message)
            .map_err(|e| ChatError::Infrastructure(format!("failed to encode message: {e}")))?;
        self.relations
            .store()
            .sorted_set_add(&keys::messages(channel), message.timestamp, &json)
            .await?;
        info!(channel = %channel, sender = %sender, id = %message.id, "message posted");

        self.fanout.publish(
            Topic::channel(channel),
            &Event::IncomingMessage(message.clone()),
        );
        if let (Some(record), Some(recipient)) = (sender_record, channel.counterpart(sender)) {
            self.fanout.publish(
                Topic::user(recipient, UserTopic::Chats),
                &Event::NewMessage(ChatPreview {
                    message: message.clone(),
                    sender_img: record.image,
                    sender_name: record.name,
                }),
            );
        }
        Ok(message)
    }

    /// The whole log of a channel. Callers authorize first.
    pub async fn fetch_channel_history(&self, channel: &ChannelKey) -> Result<ChannelHistory> {
        self.fetch_channel_history_range(channel, 0, -1).await
    }

    /// An inclusive slice of the log in storage order, with Redis-style
    /// negative indices. `(-50, -1)` is the latest fifty messages.
    pub async fn fetch_channel_history_range(
        &self,
        channel: &ChannelKey,
        start: i64,
        end: i64,
    ) -> Result<ChannelHistory> {
        let entries = self
            .relations
            .store()
            .sorted_set_range(&keys::messages(channel), start, end)
            .await?;
        Ok(ChannelHistory {
            channel: channel.clone(),
            entries,
        })
    }

    pub async fn message_count(&self, channel: &ChannelKey) -> Result<usize> {
        let entries = self
            .relations
            .store()
            .sorted_set_range(&keys::messages(channel), 0, -1)
            .await?;
        Ok(entries.len())
    }
}

/// Raw log entries of a channel, in storage (oldest first) order.
///
/// Entries are decoded lazily and yielded newest first. An entry that does
/// not decode is skipped with a warning rather than failing the whole fetch.
#[derive(Debug, Clone)]
pub struct ChannelHistory {
    channel: ChannelKey,
    entries: Vec<String>,
}

impl ChannelHistory {
    pub fn channel(&self) -> &ChannelKey {
        &self.channel
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Message> + '_ {
        self.entries
            .iter()
            .rev()
            .filter_map(|raw| match serde_json::from_str::<Message>(raw) {
                Ok(message) => Some(message),
                Err(e) => {
                    warn!(channel = %self.channel, error = %e, "skipping undecodable log entry");
                    None
                }
            })
    }

    pub fn to_vec(&self) -> Vec<Message> {
        self.iter().collect()
    }
}
