//! Live event delivery to one connected viewer over a WebSocket.
//!
//! A [`LiveFeed`] is opened while the upgrade request is still plain HTTP,
//! so the viewer is subscribed before the handshake completes and nothing
//! published after the upgrade is missed.

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tracing::{debug, error, info};

use chatterbox_net::{Inbox, LocalRelay, Subscription};
use chatterbox_shared::protocol::{Envelope, Event, SessionSnapshot};
use chatterbox_shared::topics::{Topic, UserTopic};
use chatterbox_shared::types::{ChannelKey, UserId};

pub struct LiveFeed {
    viewer: UserId,
    inbox: Inbox,
    subscriptions: Vec<Subscription>,
}

impl LiveFeed {
    /// Subscribe the viewer's personal topics and the chat of every group in
    /// the snapshot.
    pub fn open(relay: &LocalRelay, snapshot: &SessionSnapshot) -> Self {
        let mut feed = Self {
            viewer: snapshot.user.id.clone(),
            inbox: relay.inbox(),
            subscriptions: Vec::new(),
        };
        for subtype in UserTopic::ALL {
            feed.follow(Topic::user(&snapshot.user.id, subtype));
        }
        for group in &snapshot.groups {
            feed.follow(Topic::channel(&ChannelKey::group(group.name.clone())));
        }
        feed
    }

    pub fn follow(&mut self, topic: Topic) {
        if !self.subscriptions.iter().any(|sub| sub.topic() == &topic) {
            self.subscriptions.push(self.inbox.subscribe(topic));
        }
    }

    pub fn topics(&self) -> impl Iterator<Item = &Topic> {
        self.subscriptions.iter().map(Subscription::topic)
    }

    /// Next event for the viewer. Groups the viewer joins while connected
    /// have their chat followed from then on.
    pub async fn next(&mut self) -> Option<Envelope> {
        let envelope = self.inbox.recv().await?;
        if let Event::NewGroup(group) = &envelope.event {
            let topic = Topic::channel(&ChannelKey::group(group.name.clone()));
            debug!(viewer = %self.viewer, topic = %topic, "following new group chat");
            self.follow(topic);
        }
        Some(envelope)
    }
}

/// Pump events into the socket until the viewer goes away. Dropping the
/// feed on return releases every subscription.
pub async fn run(socket: WebSocket, mut feed: LiveFeed) {
    let (mut sender, mut receiver) = socket.split();
    info!(viewer = %feed.viewer, topics = feed.subscriptions.len(), "live feed connected");

    loop {
        tokio::select! {
            envelope = feed.next() => {
                let Some(envelope) = envelope else { break };
                match serde_json::to_string(&envelope) {
                    Ok(json) => {
                        if sender.send(Message::Text(json)).await.is_err() {
                            break;
                        }
                    }
                    Err(e) => error!(error = %e, "failed to encode event"),
                }
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                // Viewers only listen.
                Some(Ok(_)) => {}
            }
        }
    }

    info!(viewer = %feed.viewer, "live feed closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatterbox_net::EventSink;
    use chatterbox_shared::types::{Group, GroupName, User};

    fn snapshot(groups: &[&str]) -> SessionSnapshot {
        SessionSnapshot {
            user: User {
                id: "u1".into(),
                name: "Alice".into(),
                email: "a@x.com".into(),
                image: String::new(),
            },
            friends: Vec::new(),
            groups: groups
                .iter()
                .map(|name| Group {
                    name: GroupName::parse(name).unwrap(),
                })
                .collect(),
            unseen_friend_requests: 0,
            unseen_group_requests: 0,
        }
    }

    #[tokio::test]
    async fn test_open_follows_personal_and_group_topics() {
        let relay = LocalRelay::new();
        let feed = LiveFeed::open(&relay, &snapshot(&["night-owls"]));
        assert_eq!(feed.topics().count(), UserTopic::ALL.len() + 1);

        let group_topic = Topic::channel(&ChannelKey::parse("night-owls").unwrap());
        assert_eq!(relay.subscriber_count(&group_topic), 1);

        drop(feed);
        assert_eq!(relay.topic_count(), 0);
    }

    #[tokio::test]
    async fn test_new_group_is_followed() {
        let relay = LocalRelay::new();
        let mut feed = LiveFeed::open(&relay, &snapshot(&[]));
        let group = Group {
            name: GroupName::parse("day-larks").unwrap(),
        };

        let groups_topic = Topic::user(&"u1".into(), UserTopic::Groups);
        relay
            .publish(&groups_topic, &Event::NewGroup(group.clone()))
            .unwrap();
        let envelope = feed.next().await.unwrap();
        assert_eq!(envelope.event, Event::NewGroup(group.clone()));

        let chat_topic = Topic::channel(&ChannelKey::group(group.name));
        assert!(feed.topics().any(|t| t == &chat_topic));
        assert_eq!(relay.subscriber_count(&chat_topic), 1);
    }
}
