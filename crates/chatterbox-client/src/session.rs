//! A connected viewer: inbox, topic subscriptions and unseen activity.
//!
//! Subscriptions are RAII guards. Dropping the session, or navigating away
//! from a chat, releases the corresponding topics on the relay.

use tracing::{debug, info};

use chatterbox_net::{Inbox, LocalRelay, Subscription};
use chatterbox_shared::protocol::{Envelope, Event, SessionSnapshot};
use chatterbox_shared::topics::{Topic, UserTopic};
use chatterbox_shared::types::{ChannelKey, Message};

use crate::activity::{RequestKind, UnseenActivity, View};
use crate::events::Outcome;

pub struct ViewerSession {
    inbox: Inbox,
    /// Personal topics plus the chat topic of every joined group.
    standing: Vec<Subscription>,
    /// Channel topic of the open chat, unless it is already standing.
    view_subscription: Option<Subscription>,
    activity: UnseenActivity,
}

impl ViewerSession {
    pub fn start(relay: &LocalRelay, snapshot: SessionSnapshot) -> Self {
        let inbox = relay.inbox();
        let viewer = snapshot.user.id.clone();

        let mut standing: Vec<Subscription> = UserTopic::ALL
            .iter()
            .map(|sub| inbox.subscribe(Topic::user(&viewer, *sub)))
            .collect();
        for group in &snapshot.groups {
            standing.push(inbox.subscribe(Topic::channel(&ChannelKey::group(group.name.clone()))));
        }
        info!(viewer = %viewer, topics = standing.len(), "viewer session started");

        Self {
            inbox,
            standing,
            view_subscription: None,
            activity: UnseenActivity::from_snapshot(snapshot),
        }
    }

    pub fn activity(&self) -> &UnseenActivity {
        &self.activity
    }

    /// Topics this session currently listens on.
    pub fn topics(&self) -> Vec<&Topic> {
        self.standing
            .iter()
            .chain(self.view_subscription.iter())
            .map(Subscription::topic)
            .collect()
    }

    /// Open a page. `history` is the channel log as fetched from the server,
    /// newest first; it is ignored for non-chat pages.
    pub fn navigate(&mut self, view: View, history: Vec<Message>) {
        // Joined groups normally have a standing subscription already; any
        // other channel is followed only while it is open.
        let topic = match &view {
            View::Chat(channel) => {
                let topic = Topic::channel(channel);
                let standing = self.standing.iter().any(|sub| sub.topic() == &topic);
                (!standing).then_some(topic)
            }
            _ => None,
        };
        // Subscribing before releasing keeps a re-opened chat attached.
        let next = topic.map(|t| self.inbox.subscribe(t));
        self.view_subscription = next;
        self.activity.navigate(view, history);
    }

    pub fn request_resolved(&mut self, kind: RequestKind) {
        self.activity.request_resolved(kind);
    }

    fn handle(&mut self, envelope: Envelope) -> Outcome {
        let outcome = self.activity.apply(&envelope);
        if let (Event::NewGroup(group), Outcome::RosterUpdated) = (&envelope.event, &outcome) {
            let topic = Topic::channel(&ChannelKey::group(group.name.clone()));
            debug!(topic = %topic, "subscribing to new group chat");
            self.standing.push(self.inbox.subscribe(topic));
        }
        outcome
    }

    /// Apply every event already queued, without waiting.
    pub fn pump(&mut self) -> Vec<Outcome> {
        let mut outcomes = Vec::new();
        while let Some(envelope) = self.inbox.try_recv() {
            outcomes.push(self.handle(envelope));
        }
        outcomes
    }

    /// Wait for the next event and apply it.
    pub async fn next(&mut self) -> Option<Outcome> {
        let envelope = self.inbox.recv().await?;
        Some(self.handle(envelope))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chatterbox_net::EventSink;
    use chatterbox_server::api::AppState;
    use chatterbox_server::config::ServerConfig;
    use chatterbox_shared::types::{GroupName, User, UserId};
    use chatterbox_store::MemoryStore;

    fn user(id: &str, name: &str, email: &str) -> User {
        User {
            id: id.into(),
            name: name.into(),
            email: email.into(),
            image: format!("https://img.example/{id}.png"),
        }
    }

    async fn server(relay: &LocalRelay) -> AppState {
        let state = AppState::new(
            Arc::new(MemoryStore::new()),
            relay.clone(),
            ServerConfig::default(),
        );
        for (id, name, email) in [
            ("u1", "Alice", "a@x.com"),
            ("u2", "Bob", "b@x.com"),
            ("u3", "Cid", "c@x.com"),
        ] {
            state
                .relations
                .put_user(&user(id, name, email))
                .await
                .unwrap();
        }
        state
    }

    async fn session(state: &AppState, relay: &LocalRelay, id: &str) -> ViewerSession {
        let snapshot = state.relations.session_snapshot(&id.into()).await.unwrap();
        ViewerSession::start(relay, snapshot)
    }

    #[tokio::test]
    async fn test_friend_scenario_end_to_end() {
        let relay = LocalRelay::new();
        let state = server(&relay).await;
        let mut alice = session(&state, &relay, "u1").await;
        let mut bob = session(&state, &relay, "u2").await;

        state
            .requests
            .propose_friend_request(&"u1".into(), "b@x.com")
            .await
            .unwrap();
        assert_eq!(bob.pump(), vec![Outcome::Counted]);
        assert_eq!(bob.activity().unseen_friend_requests(), 1);

        state
            .requests
            .accept_friend_request(&"u2".into(), &"u1".into())
            .await
            .unwrap();
        bob.request_resolved(RequestKind::Friend);
        assert_eq!(bob.pump(), vec![Outcome::RosterUpdated]);
        assert_eq!(alice.pump(), vec![Outcome::RosterUpdated]);
        assert_eq!(alice.activity().friends(), &[user("u2", "Bob", "b@x.com")][..]);
        assert_eq!(bob.activity().friends(), &[user("u1", "Alice", "a@x.com")][..]);
        assert_eq!(bob.activity().unseen_friend_requests(), 0);

        // Bob messages Alice while she is on the dashboard.
        let channel = ChannelKey::direct(&"u1".into(), &"u2".into());
        state
            .messaging
            .post_message(&"u2".into(), &channel, "hi alice", None)
            .await
            .unwrap();
        let outcomes = alice.pump();
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(&outcomes[0], Outcome::Notify(p) if p.sender_name == "Bob"));
        assert_eq!(alice.activity().unseen_messages(&channel), 1);

        // Alice opens the chat: counter cleared, new messages land in history.
        let history = state
            .messaging
            .fetch_channel_history(&channel)
            .await
            .unwrap()
            .to_vec();
        alice.navigate(View::Chat(channel.clone()), history);
        assert_eq!(alice.activity().unseen_messages(&channel), 0);

        state
            .messaging
            .post_message(&"u2".into(), &channel, "you there?", None)
            .await
            .unwrap();
        let outcomes = alice.pump();
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes.contains(&Outcome::Suppressed));
        assert!(outcomes.iter().any(|o| matches!(o, Outcome::Displayed(_))));
        let texts: Vec<&str> = alice
            .activity()
            .history()
            .iter()
            .map(|m| m.text.as_str())
            .collect();
        assert_eq!(texts, vec!["you there?", "hi alice"]);
        assert_eq!(alice.activity().unseen_messages(&channel), 0);
    }

    #[tokio::test]
    async fn test_group_scenario_end_to_end() {
        let relay = LocalRelay::new();
        let state = server(&relay).await;
        let (u1, u2) = (UserId::from("u1"), UserId::from("u2"));

        state.requests.create_group(&u1, "night-owls").await.unwrap();
        let mut alice = session(&state, &relay, "u1").await;
        let mut bob = session(&state, &relay, "u2").await;

        state
            .requests
            .propose_group_join_request(&u1, "night-owls", "b@x.com")
            .await
            .unwrap();
        assert_eq!(alice.pump(), vec![Outcome::Counted]);
        assert_eq!(alice.activity().unseen_group_requests(), 1);

        state
            .requests
            .accept_group_join_request(&u1, "night-owls", &u2)
            .await
            .unwrap();
        alice.request_resolved(RequestKind::Group);
        // Alice is told about the new member; Bob gets the group.
        assert_eq!(alice.pump(), vec![Outcome::Ignored]);
        assert_eq!(bob.pump(), vec![Outcome::RosterUpdated]);

        // Bob's session picked up the group chat topic on the fly.
        let channel = ChannelKey::group(GroupName::parse("night-owls").unwrap());
        assert!(bob.topics().contains(&&Topic::channel(&channel)));

        state
            .messaging
            .post_message(&u1, &channel, "welcome", None)
            .await
            .unwrap();
        assert_eq!(bob.pump(), vec![Outcome::Counted]);
        assert_eq!(bob.activity().unseen_messages(&channel), 1);
        // Own messages are not unseen.
        assert_eq!(alice.pump(), vec![Outcome::Ignored]);
        assert_eq!(alice.activity().unseen_messages(&channel), 0);
    }

    #[tokio::test]
    async fn test_group_creator_sees_live_messages() {
        let relay = LocalRelay::new();
        let state = server(&relay).await;
        let (u1, u2) = (UserId::from("u1"), UserId::from("u2"));
        let mut alice = session(&state, &relay, "u1").await;

        let group = state.requests.create_group(&u1, "night-owls").await.unwrap();
        assert_eq!(alice.pump(), vec![Outcome::RosterUpdated]);
        assert_eq!(alice.activity().groups(), &[group.clone()][..]);
        let channel = ChannelKey::group(group.name);
        assert!(alice.topics().contains(&&Topic::channel(&channel)));

        state
            .requests
            .propose_group_join_request(&u1, "night-owls", "b@x.com")
            .await
            .unwrap();
        state
            .requests
            .accept_group_join_request(&u1, "night-owls", &u2)
            .await
            .unwrap();
        alice.request_resolved(RequestKind::Group);
        alice.pump();

        alice.navigate(View::Chat(channel.clone()), Vec::new());
        state
            .messaging
            .post_message(&u2, &channel, "hello admin", None)
            .await
            .unwrap();
        let outcomes = alice.pump();
        assert_eq!(outcomes.len(), 1);
        assert!(matches!(&outcomes[0], Outcome::Displayed(m) if m.text == "hello admin"));
        assert_eq!(alice.activity().history().len(), 1);
    }

    #[tokio::test]
    async fn test_open_group_chat_without_standing_subscription() {
        let relay = LocalRelay::new();
        let channel = ChannelKey::group(GroupName::parse("night-owls").unwrap());
        let chat_topic = Topic::channel(&channel);
        // A session whose snapshot predates joining the group.
        let snapshot = SessionSnapshot {
            user: user("u1", "Alice", "a@x.com"),
            friends: Vec::new(),
            groups: Vec::new(),
            unseen_friend_requests: 0,
            unseen_group_requests: 0,
        };
        let mut viewer = ViewerSession::start(&relay, snapshot);

        viewer.navigate(View::Chat(channel), Vec::new());
        assert_eq!(relay.subscriber_count(&chat_topic), 1);
        viewer.navigate(View::Dashboard, Vec::new());
        assert_eq!(relay.subscriber_count(&chat_topic), 0);
    }

    #[tokio::test]
    async fn test_subscriptions_released() {
        let relay = LocalRelay::new();
        let channel = ChannelKey::direct(&"u1".into(), &"u2".into());
        let chat_topic = Topic::channel(&channel);
        let snapshot = SessionSnapshot {
            user: user("u1", "Alice", "a@x.com"),
            friends: vec![user("u2", "Bob", "b@x.com")],
            groups: Vec::new(),
            unseen_friend_requests: 0,
            unseen_group_requests: 0,
        };

        let mut viewer = ViewerSession::start(&relay, snapshot);
        assert_eq!(relay.topic_count(), 5);

        viewer.navigate(View::Chat(channel.clone()), Vec::new());
        assert_eq!(relay.subscriber_count(&chat_topic), 1);
        // Re-opening the same chat keeps the subscription.
        viewer.navigate(View::Chat(channel), Vec::new());
        assert_eq!(relay.subscriber_count(&chat_topic), 1);

        viewer.navigate(View::Dashboard, Vec::new());
        assert_eq!(relay.subscriber_count(&chat_topic), 0);

        drop(viewer);
        assert_eq!(relay.topic_count(), 0);
    }

    #[tokio::test]
    async fn test_next_waits_for_events() {
        let relay = LocalRelay::new();
        let snapshot = SessionSnapshot {
            user: user("u1", "Alice", "a@x.com"),
            friends: Vec::new(),
            groups: Vec::new(),
            unseen_friend_requests: 0,
            unseen_group_requests: 0,
        };
        let mut viewer = ViewerSession::start(&relay, snapshot);

        let publisher = relay.clone();
        tokio::spawn(async move {
            let topic = Topic::user(&"u1".into(), UserTopic::Friends);
            let _ = publisher.publish(&topic, &Event::NewFriend(user("u2", "Bob", "b@x.com")));
        });

        assert_eq!(viewer.next().await, Some(Outcome::RosterUpdated));
        assert_eq!(viewer.activity().friends().len(), 1);
    }
}
