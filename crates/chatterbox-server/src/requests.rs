//! Request workflow engine.
//!
//! Friend and group-join requests are two-phase: propose, then accept or
//! deny. Every operation checks its preconditions first, in a fixed order,
//! and returns the first failure without touching the store. Accept and deny
//! claim the pending request with an atomic set removal, so two concurrent
//! resolutions of the same request cannot both succeed. When a write after
//! a claim fails, the claim is handed back before the error is returned, so
//! the caller can retry against the state it started from.

use tracing::{debug, info, warn};

use chatterbox_shared::error::{ChatError, Result};
use chatterbox_shared::protocol::{
    Event, FriendRequestPayload, GroupMemberPayload, GroupRequestPayload,
};
use chatterbox_shared::topics::{Topic, UserTopic};
use chatterbox_shared::types::{Group, GroupName, User, UserId};

use crate::fanout::Fanout;
use crate::relations::{normalize_email, Relations};

#[derive(Clone)]
pub struct RequestEngine {
    relations: Relations,
    fanout: Fanout,
}

/// Names that fail validation cannot have been created, so they are
/// reported the same way as a group that does not exist.
fn existing_group_name(raw: &str) -> Result<GroupName> {
    GroupName::parse(raw).map_err(|_| ChatError::NotFound(format!("group '{raw}' does not exist")))
}

impl RequestEngine {
    pub fn new(relations: Relations, fanout: Fanout) -> Self {
        Self { relations, fanout }
    }

    // ------------------------------------------------------------------
    // Friend requests
    // ------------------------------------------------------------------

    pub async fn propose_friend_request(&self, sender: &UserId, email: &str) -> Result<()> {
        let email = normalize_email(email)?;
        let receiver = self
            .relations
            .user_by_email(&email)
            .await?
            .ok_or_else(|| ChatError::NotFound(format!("no user with email {email}")))?;

        if &receiver.id == sender {
            return Err(ChatError::SelfReference(
                "cannot send a friend request to yourself".into(),
            ));
        }
        if self.relations.is_friend(sender, &receiver.id).await? {
            return Err(ChatError::AlreadyFriends(format!(
                "already friends with {}",
                receiver.email
            )));
        }
        if self
            .relations
            .has_pending_friend_request(sender, &receiver.id)
            .await?
            || self
                .relations
                .has_pending_friend_request(&receiver.id, sender)
                .await?
        {
            return Err(ChatError::DuplicateRequest(format!(
                "a friend request with {} is already pending",
                receiver.email
            )));
        }

        let sender_record = self.relations.require_user(sender).await?;
        if !self
            .relations
            .add_pending_friend_request(sender, &receiver.id)
            .await?
        {
            return Err(ChatError::DuplicateRequest(format!(
                "a friend request with {} is already pending",
                receiver.email
            )));
        }
        info!(from = %sender, to = %receiver.id, "friend request proposed");

        self.fanout.publish(
            Topic::user(&receiver.id, UserTopic::FriendRequests),
            &Event::IncomingFriendRequest(FriendRequestPayload {
                sender_id: sender_record.id,
                sender_email: sender_record.email,
            }),
        );
        Ok(())
    }

    /// Accept the pending request `sender` sent to `receiver`. Returns the
    /// new friend's record.
    pub async fn accept_friend_request(&self, receiver: &UserId, sender: &UserId) -> Result<User> {
        if !self
            .relations
            .has_pending_friend_request(sender, receiver)
            .await?
        {
            return Err(no_friend_request(sender));
        }
        let receiver_record = self.relations.require_user(receiver).await?;
        let sender_record = self.relations.require_user(sender).await?;

        if !self
            .relations
            .remove_pending_friend_request(sender, receiver)
            .await?
        {
            return Err(no_friend_request(sender));
        }
        if let Err(e) = self.relations.add_friendship(receiver, sender).await {
            self.restore_friend_request(receiver, sender).await;
            return Err(e);
        }
        // A crossing request in the other direction is settled too.
        if let Err(e) = self
            .relations
            .remove_pending_friend_request(receiver, sender)
            .await
        {
            warn!(from = %receiver, to = %sender, error = %e, "crossing friend request left pending");
        }
        info!(receiver = %receiver, sender = %sender, "friend request accepted");

        self.fanout.publish(
            Topic::user(sender, UserTopic::Friends),
            &Event::NewFriend(receiver_record),
        );
        self.fanout.publish(
            Topic::user(receiver, UserTopic::Friends),
            &Event::NewFriend(sender_record.clone()),
        );
        Ok(sender_record)
    }

    async fn restore_friend_request(&self, receiver: &UserId, sender: &UserId) {
        let restored = async {
            self.relations.remove_friendship(receiver, sender).await?;
            self.relations
                .add_pending_friend_request(sender, receiver)
                .await
        };
        if let Err(e) = restored.await {
            warn!(receiver = %receiver, sender = %sender, error = %e, "could not restore friend request");
        }
    }

    pub async fn deny_friend_request(&self, receiver: &UserId, sender: &UserId) -> Result<()> {
        if !self
            .relations
            .remove_pending_friend_request(sender, receiver)
            .await?
        {
            return Err(no_friend_request(sender));
        }
        info!(receiver = %receiver, sender = %sender, "friend request denied");
        Ok(())
    }

    // ------------------------------------------------------------------
    // Groups
    // ------------------------------------------------------------------

    /// The creator becomes the first member and the first admin, and is
    /// sent `new_group` like any other joiner.
    pub async fn create_group(&self, creator: &UserId, name: &str) -> Result<Group> {
        let name = GroupName::parse(name)?;
        self.relations.require_user(creator).await?;
        if !self.relations.register_group(&name).await? {
            return Err(ChatError::AlreadyExists(format!(
                "group '{name}' already exists"
            )));
        }
        let founded = async {
            self.relations.add_group_member(&name, creator).await?;
            self.relations.add_group_admin(&name, creator).await
        };
        if let Err(e) = founded.await {
            self.release_group(&name, creator).await;
            return Err(e);
        }
        info!(group = %name, creator = %creator, "group created");

        let group = Group { name };
        self.fanout.publish(
            Topic::user(creator, UserTopic::Groups),
            &Event::NewGroup(group.clone()),
        );
        Ok(group)
    }

    /// Undo a partial `create_group`. The registry entry goes last so the
    /// name stays claimed until the rest is gone.
    async fn release_group(&self, name: &GroupName, creator: &UserId) {
        let released = async {
            self.relations.remove_group_admin(name, creator).await?;
            self.relations.remove_group_member(name, creator).await?;
            self.relations.unregister_group(name).await
        };
        if let Err(e) = released.await {
            warn!(group = %name, error = %e, "could not release group name");
        }
    }

    /// An admin proposes `email` for membership. The pending request is
    /// keyed by the candidate and goes to every admin for resolution.
    pub async fn propose_group_join_request(
        &self,
        proposer: &UserId,
        group: &str,
        email: &str,
    ) -> Result<()> {
        let group = self.require_group(group).await?;
        let email = normalize_email(email)?;
        let candidate = self
            .relations
            .user_by_email(&email)
            .await?
            .ok_or_else(|| ChatError::NotFound(format!("no user with email {email}")))?;

        if !self.relations.is_group_admin(&group, proposer).await? {
            return Err(ChatError::Unauthorized(format!(
                "only admins of '{group}' can propose members"
            )));
        }
        self.register_join_request(&group, candidate).await
    }

    /// A user asks to join a group on their own behalf.
    pub async fn request_to_join_group(&self, requester: &UserId, group: &str) -> Result<()> {
        let group = self.require_group(group).await?;
        let candidate = self.relations.require_user(requester).await?;
        self.register_join_request(&group, candidate).await
    }

    async fn register_join_request(&self, group: &GroupName, candidate: User) -> Result<()> {
        if self.relations.is_group_member(group, &candidate.id).await? {
            return Err(ChatError::AlreadyMember(format!(
                "{} is already a member of '{group}'",
                candidate.email
            )));
        }
        if self
            .relations
            .has_pending_group_request(group, &candidate.id)
            .await?
            || !self
                .relations
                .add_pending_group_request(group, &candidate.id)
                .await?
        {
            return Err(ChatError::DuplicateRequest(format!(
                "{} already has a pending request for '{group}'",
                candidate.email
            )));
        }
        info!(group = %group, candidate = %candidate.id, "group join request registered");

        let event = Event::IncomingGroupRequest(GroupRequestPayload {
            sender_id: candidate.id,
            sender_email: candidate.email,
            group_name: group.clone(),
        });
        for admin in self.relations.group_admin_ids(group).await? {
            self.fanout
                .publish(Topic::user(&admin, UserTopic::GroupRequests), &event);
        }
        Ok(())
    }

    pub async fn accept_group_join_request(
        &self,
        admin: &UserId,
        group: &str,
        candidate: &UserId,
    ) -> Result<()> {
        let group = self.require_admin(admin, group).await?;
        if !self
            .relations
            .has_pending_group_request(&group, candidate)
            .await?
        {
            return Err(no_group_request(&group, candidate));
        }
        let candidate_record = self.relations.require_user(candidate).await?;
        let existing_members = self.relations.group_member_ids(&group).await?;

        if !self
            .relations
            .remove_pending_group_request(&group, candidate)
            .await?
        {
            return Err(no_group_request(&group, candidate));
        }
        if let Err(e) = self.relations.add_group_member(&group, candidate).await {
            self.restore_group_request(&group, candidate).await;
            return Err(e);
        }
        info!(group = %group, admin = %admin, member = %candidate, "group join request accepted");

        self.fanout.publish(
            Topic::user(candidate, UserTopic::Groups),
            &Event::NewGroup(Group { name: group.clone() }),
        );
        let event = Event::NewGroupMember(GroupMemberPayload {
            group_name: group.clone(),
            member: candidate_record,
        });
        for member in existing_members.iter().filter(|m| *m != candidate) {
            self.fanout
                .publish(Topic::user(member, UserTopic::Groups), &event);
        }
        debug!(group = %group, notified = existing_members.len(), "group members notified");
        Ok(())
    }

    async fn restore_group_request(&self, group: &GroupName, candidate: &UserId) {
        let restored = async {
            self.relations.remove_group_member(group, candidate).await?;
            self.relations
                .add_pending_group_request(group, candidate)
                .await
        };
        if let Err(e) = restored.await {
            warn!(group = %group, candidate = %candidate, error = %e, "could not restore group join request");
        }
    }

    pub async fn deny_group_join_request(
        &self,
        admin: &UserId,
        group: &str,
        candidate: &UserId,
    ) -> Result<()> {
        let group = self.require_admin(admin, group).await?;
        if !self
            .relations
            .remove_pending_group_request(&group, candidate)
            .await?
        {
            return Err(no_group_request(&group, candidate));
        }
        info!(group = %group, admin = %admin, candidate = %candidate, "group join request denied");
        Ok(())
    }

    async fn require_group(&self, raw: &str) -> Result<GroupName> {
        let group = existing_group_name(raw)?;
        if !self.relations.group_exists(&group).await? {
            return Err(ChatError::NotFound(format!("group '{group}' does not exist")));
        }
        Ok(group)
    }

    async fn require_admin(&self, admin: &UserId, raw: &str) -> Result<GroupName> {
        let group = self.require_group(raw).await?;
        if !self.relations.is_group_admin(&group, admin).await? {
            return Err(ChatError::Unauthorized(format!(
                "only admins of '{group}' can resolve join requests"
            )));
        }
        Ok(group)
    }
}

fn no_friend_request(sender: &UserId) -> ChatError {
    ChatError::NotFound(format!("no pending friend request from {sender}"))
}

fn no_group_request(group: &GroupName, candidate: &UserId) -> ChatError {
    ChatError::NotFound(format!("no pending request from {candidate} for '{group}'"))
}
