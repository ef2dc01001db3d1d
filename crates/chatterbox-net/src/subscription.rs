//! Receiving side of the relay.
//!
//! An [`Inbox`] is one receiver's queue. Topics are attached to it through
//! [`Subscription`] guards: dropping the guard detaches the topic, so a
//! viewing context that ends (normally, early, or by unwinding) never leaves
//! a standing subscription behind.

use std::sync::Arc;

use tokio::sync::mpsc;

use chatterbox_shared::protocol::Envelope;
use chatterbox_shared::topics::Topic;

use crate::relay::{InboxSender, RelayInner};

pub struct Inbox {
    id: u64,
    relay: Arc<RelayInner>,
    tx: InboxSender,
    rx: mpsc::UnboundedReceiver<Envelope>,
}

impl Inbox {
    pub(crate) fn new(id: u64, relay: Arc<RelayInner>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self { id, relay, tx, rx }
    }

    /// Start receiving events published on `topic`. Events stop arriving once
    /// every guard for `topic` on this inbox is dropped; already queued events
    /// stay queued. Subscribing twice does not duplicate deliveries.
    #[must_use = "dropping the subscription unsubscribes immediately"]
    pub fn subscribe(&self, topic: Topic) -> Subscription {
        self.relay.attach(&topic, self.id, self.tx.clone());
        Subscription {
            topic,
            inbox_id: self.id,
            relay: Arc::clone(&self.relay),
        }
    }

    /// Wait for the next event on any subscribed topic.
    pub async fn recv(&mut self) -> Option<Envelope> {
        self.rx.recv().await
    }

    /// Next queued event, if any, without waiting.
    pub fn try_recv(&mut self) -> Option<Envelope> {
        self.rx.try_recv().ok()
    }
}

/// Scoped subscription of one inbox to one topic.
pub struct Subscription {
    topic: Topic,
    inbox_id: u64,
    relay: Arc<RelayInner>,
}

impl Subscription {
    pub fn topic(&self) -> &Topic {
        &self.topic
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.relay.detach(&self.topic, self.inbox_id);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("topic", &self.topic)
            .field("inbox", &self.inbox_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use chatterbox_shared::protocol::Event;
    use chatterbox_shared::topics::UserTopic;
    use chatterbox_shared::types::{Group, GroupName};

    use crate::relay::{EventSink, LocalRelay};

    use super::*;

    fn new_group_event() -> Event {
        Event::NewGroup(Group {
            name: GroupName::parse("night-owls").unwrap(),
        })
    }

    #[tokio::test]
    async fn test_drop_releases_subscription() {
        let relay = LocalRelay::new();
        let topic = Topic::user(&"u1".into(), UserTopic::Groups);
        let mut inbox = relay.inbox();

        {
            let _sub = inbox.subscribe(topic.clone());
            assert_eq!(relay.subscriber_count(&topic), 1);
        }

        assert_eq!(relay.subscriber_count(&topic), 0);
        assert_eq!(relay.topic_count(), 0);
        assert_eq!(relay.publish(&topic, &new_group_event()).unwrap(), 0);
        assert!(inbox.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_release_on_early_return() {
        fn view(relay: &LocalRelay, inbox: &Inbox, fail: bool) -> Result<(), &'static str> {
            let _sub = inbox.subscribe(Topic::user(&"u1".into(), UserTopic::Chats));
            if fail {
                return Err("render failed");
            }
            assert_eq!(relay.topic_count(), 1);
            Ok(())
        }

        let relay = LocalRelay::new();
        let inbox = relay.inbox();
        assert!(view(&relay, &inbox, true).is_err());
        assert_eq!(relay.topic_count(), 0);
        assert!(view(&relay, &inbox, false).is_ok());
        assert_eq!(relay.topic_count(), 0);
    }

    #[tokio::test]
    async fn test_overlapping_guards_keep_topic_attached() {
        let relay = LocalRelay::new();
        let topic = Topic::user(&"u1".into(), UserTopic::Groups);
        let mut inbox = relay.inbox();

        let first = inbox.subscribe(topic.clone());
        let second = inbox.subscribe(topic.clone());
        assert_eq!(relay.subscriber_count(&topic), 1);

        drop(first);
        assert_eq!(relay.publish(&topic, &new_group_event()).unwrap(), 1);
        assert_eq!(inbox.try_recv().map(|e| e.event), Some(new_group_event()));
        assert!(inbox.try_recv().is_none());

        drop(second);
        assert_eq!(relay.subscriber_count(&topic), 0);
        assert_eq!(relay.publish(&topic, &new_group_event()).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_dropped_inbox_is_pruned() {
        let relay = LocalRelay::new();
        let topic = Topic::user(&"u1".into(), UserTopic::Groups);
        let inbox = relay.inbox();
        let sub = inbox.subscribe(topic.clone());
        drop(inbox);

        assert_eq!(relay.publish(&topic, &new_group_event()).unwrap(), 0);
        drop(sub);
        assert_eq!(relay.topic_count(), 0);
    }
}
