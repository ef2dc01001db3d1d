//! Topic-based event fan-out.
//!
//! [`EventSink`] is the publishing contract the engines are written
//! against. [`LocalRelay`] is the in-process implementation: each topic
//! keeps an ordered list of subscribed inboxes and a publish walks that
//! list, so events on one topic reach every inbox in publish order. Nothing
//! is retained for inboxes that are not subscribed at publish time.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, trace};

use chatterbox_shared::protocol::{Envelope, Event};
use chatterbox_shared::topics::Topic;

use crate::subscription::Inbox;

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Relay unavailable: {0}")]
    Unavailable(String),
}

/// Publishing side of the relay.
pub trait EventSink: Send + Sync {
    /// Deliver `event` to every current subscriber of `topic`. Returns how
    /// many subscribers were reached.
    fn publish(&self, topic: &Topic, event: &Event) -> Result<usize, RelayError>;
}

pub(crate) type InboxSender = mpsc::UnboundedSender<Envelope>;

/// One inbox attached to a topic. `guards` counts the live
/// [`Subscription`](crate::Subscription)s holding the attachment, so the
/// same inbox can subscribe a topic from several places.
pub(crate) struct Subscriber {
    inbox_id: u64,
    sender: InboxSender,
    guards: usize,
}

#[derive(Default)]
pub(crate) struct RelayInner {
    /// Topic -> attached inboxes in subscription order.
    topics: DashMap<Topic, Vec<Subscriber>>,
    next_inbox_id: AtomicU64,
}

impl RelayInner {
    pub(crate) fn attach(&self, topic: &Topic, inbox_id: u64, sender: InboxSender) {
        let mut subscribers = self.topics.entry(topic.clone()).or_default();
        match subscribers.iter_mut().find(|s| s.inbox_id == inbox_id) {
            Some(existing) => existing.guards += 1,
            None => subscribers.push(Subscriber {
                inbox_id,
                sender,
                guards: 1,
            }),
        }
        debug!(topic = %topic, inbox = inbox_id, "subscribed");
    }

    pub(crate) fn detach(&self, topic: &Topic, inbox_id: u64) {
        let now_empty = match self.topics.get_mut(topic) {
            Some(mut subscribers) => {
                if let Some(pos) = subscribers.iter().position(|s| s.inbox_id == inbox_id) {
                    subscribers[pos].guards -= 1;
                    if subscribers[pos].guards == 0 {
                        subscribers.remove(pos);
                    }
                }
                subscribers.is_empty()
            }
            None => return,
        };
        if now_empty {
            self.topics.remove_if(topic, |_, subscribers| subscribers.is_empty());
        }
        debug!(topic = %topic, inbox = inbox_id, "unsubscribed");
    }
}

/// In-process relay. Cheap to clone; clones share the same topics.
#[derive(Clone, Default)]
pub struct LocalRelay {
    inner: Arc<RelayInner>,
}

impl LocalRelay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new receiving queue. It receives nothing until it subscribes
    /// to at least one topic.
    pub fn inbox(&self) -> Inbox {
        let id = self.inner.next_inbox_id.fetch_add(1, Ordering::Relaxed);
        Inbox::new(id, Arc::clone(&self.inner))
    }

    /// Number of distinct inboxes currently subscribed to `topic`.
    pub fn subscriber_count(&self, topic: &Topic) -> usize {
        self.inner
            .topics
            .get(topic)
            .map(|subscribers| subscribers.len())
            .unwrap_or(0)
    }

    /// Number of topics with at least one subscriber.
    pub fn topic_count(&self) -> usize {
        self.inner.topics.len()
    }
}

impl EventSink for LocalRelay {
    fn publish(&self, topic: &Topic, event: &Event) -> Result<usize, RelayError> {
        let Some(mut subscribers) = self.inner.topics.get_mut(topic) else {
            trace!(topic = %topic, event = event.name(), "no subscribers");
            return Ok(0);
        };

        let envelope = Envelope {
            topic: topic.clone(),
            event: event.clone(),
        };
        // A send only fails when the inbox is gone; prune it.
        subscribers.retain(|s| s.sender.send(envelope.clone()).is_ok());
        let delivered = subscribers.len();

        debug!(topic = %topic, event = event.name(), delivered, "published");
        Ok(delivered)
    }
}
