//! Identity & relationship model.
//!
//! Maps the logical relations of the chat (is-friend-of, is-member-of,
//! is-admin-of, has-pending-request-to) onto store keys. Predicates are
//! point lookups; write primitives are single store calls. There is no
//! business logic here beyond that mapping.

use std::sync::Arc;

use futures::future::try_join_all;
use tracing::warn;

use chatterbox_shared::error::{ChatError, Result};
use chatterbox_shared::protocol::{FriendRequestPayload, GroupRequestPayload, SessionSnapshot};
use chatterbox_shared::types::{Group, GroupName, User, UserId};
use chatterbox_store::Store;

use crate::keys;

/// Trim, lowercase and minimally validate an email address.
pub fn normalize_email(raw: &str) -> Result<String> {
    let email = raw.trim().to_lowercase();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && !domain.is_empty() => Ok(email),
        _ => Err(ChatError::InvalidInput(format!("'{}' is not an email address", raw.trim()))),
    }
}

#[derive(Clone)]
pub struct Relations {
    store: Arc<dyn Store>,
}

impl Relations {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &dyn Store {
        self.store.as_ref()
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    /// Provisioning hook for the identity provider: writes the record and
    /// the email index.
    pub async fn put_user(&self, user: &User) -> Result<()> {
        UserId::parse(user.id.as_str())?;
        let email = normalize_email(&user.email)?;
        let json = serde_json::to_string(user)
            .map_err(|e| ChatError::InvalidInput(format!("unencodable user record: {e}")))?;
        self.store.set(&keys::user(&user.id), &json).await?;
        self.store
            .set(&keys::user_by_email(&email), user.id.as_str())
            .await?;
        Ok(())
    }

    pub async fn user(&self, id: &UserId) -> Result<Option<User>> {
        let Some(raw) = self.store.get(&keys::user(id)).await? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| ChatError::Infrastructure(format!("corrupt record for user {id}: {e}")))
    }

    /// Like [`Relations::user`], but a missing record is a `NotFound`.
    pub async fn require_user(&self, id: &UserId) -> Result<User> {
        self.user(id)
            .await?
            .ok_or_else(|| ChatError::NotFound(format!("user {id} does not exist")))
    }

    pub async fn user_by_email(&self, email: &str) -> Result<Option<User>> {
        let email = normalize_email(email)?;
        match self.store.get(&keys::user_by_email(&email)).await? {
            Some(id) => self.user(&UserId::new(id)).await,
            None => Ok(None),
        }
    }

    /// Resolve ids to records, skipping ids whose record is missing.
    async fn users(&self, ids: Vec<String>) -> Result<Vec<User>> {
        let ids: Vec<UserId> = ids.into_iter().map(UserId::new).collect();
        let records = try_join_all(ids.iter().map(|id| self.user(id))).await?;
        Ok(ids
            .iter()
            .zip(records)
            .filter_map(|(id, record)| {
                if record.is_none() {
                    warn!(user = %id, "relation points at a missing user record");
                }
                record
            })
            .collect())
    }

    // ------------------------------------------------------------------
    // Predicates
    // ------------------------------------------------------------------

    pub async fn is_friend(&self, a: &UserId, b: &UserId) -> Result<bool> {
        Ok(self
            .store
            .set_is_member(&keys::friends(a), b.as_str())
            .await?)
    }

    pub async fn group_exists(&self, group: &GroupName) -> Result<bool> {
        Ok(self
            .store
            .set_is_member(keys::GROUP_REGISTRY, group.as_str())
            .await?)
    }

    pub async fn is_group_member(&self, group: &GroupName, user: &UserId) -> Result<bool> {
        Ok(self
            .store
            .set_is_member(&keys::group_members(group), user.as_str())
            .await?)
    }

    pub async fn is_group_admin(&self, group: &GroupName, user: &UserId) -> Result<bool> {
        Ok(self
            .store
            .set_is_member(&keys::group_admins(group), user.as_str())
            .await?)
    }

    pub async fn has_pending_friend_request(&self, from: &UserId, to: &UserId) -> Result<bool> {
        Ok(self
            .store
            .set_is_member(&keys::incoming_friend_requests(to), from.as_str())
            .await?)
    }

    pub async fn has_pending_group_request(&self, group: &GroupName, user: &UserId) -> Result<bool> {
        Ok(self
            .store
            .set_is_member(&keys::group_requests(group), user.as_str())
            .await?)
    }

    // ------------------------------------------------------------------
    // Write primitives
    // ------------------------------------------------------------------

    /// Returns `false` if the request was already pending.
    pub async fn add_pending_friend_request(&self, from: &UserId, to: &UserId) -> Result<bool> {
        Ok(self
            .store
            .set_add(&keys::incoming_friend_requests(to), from.as_str())
            .await?)
    }

    /// Returns `false` if there was nothing to remove; callers use this as
    /// the claim on the request.
    pub async fn remove_pending_friend_request(&self, from: &UserId, to: &UserId) -> Result<bool> {
        Ok(self
            .store
            .set_remove(&keys::incoming_friend_requests(to), from.as_str())
            .await?)
    }

    pub async fn add_friendship(&self, a: &UserId, b: &UserId) -> Result<()> {
        self.store.set_add(&keys::friends(a), b.as_str()).await?;
        self.store.set_add(&keys::friends(b), a.as_str()).await?;
        Ok(())
    }

    /// Reverses [`Relations::add_friendship`].
    pub async fn remove_friendship(&self, a: &UserId, b: &UserId) -> Result<()> {
        self.store.set_remove(&keys::friends(a), b.as_str()).await?;
        self.store.set_remove(&keys::friends(b), a.as_str()).await?;
        Ok(())
    }

    /// Returns `false` if the name is already taken.
    pub async fn register_group(&self, group: &GroupName) -> Result<bool> {
        Ok(self
            .store
            .set_add(keys::GROUP_REGISTRY, group.as_str())
            .await?)
    }

    /// Adds to the member set and lists the group for the user.
    pub async fn add_group_member(&self, group: &GroupName, user: &UserId) -> Result<()> {
        self.store
            .set_add(&keys::group_members(group), user.as_str())
            .await?;
        self.store
            .set_add(&keys::user_groups(user), group.as_str())
            .await?;
        Ok(())
    }

    /// Releases a registry claim.
    pub async fn unregister_group(&self, group: &GroupName) -> Result<()> {
        self.store
            .set_remove(keys::GROUP_REGISTRY, group.as_str())
            .await?;
        Ok(())
    }

    /// Reverses [`Relations::add_group_member`].
    pub async fn remove_group_member(&self, group: &GroupName, user: &UserId) -> Result<()> {
        self.store
            .set_remove(&keys::group_members(group), user.as_str())
            .await?;
        self.store
            .set_remove(&keys::user_groups(user), group.as_str())
            .await?;
        Ok(())
    }

    /// The user must already be a member.
    pub async fn add_group_admin(&self, group: &GroupName, user: &UserId) -> Result<()> {
        self.store
            .set_add(&keys::group_admins(group), user.as_str())
            .await?;
        Ok(())
    }

    pub async fn remove_group_admin(&self, group: &GroupName, user: &UserId) -> Result<()> {
        self.store
            .set_remove(&keys::group_admins(group), user.as_str())
            .await?;
        Ok(())
    }

    /// Returns `false` if the request was already pending.
    pub async fn add_pending_group_request(&self, group: &GroupName, user: &UserId) -> Result<bool> {
        Ok(self
            .store
            .set_add(&keys::group_requests(group), user.as_str())
            .await?)
    }

    /// Returns `false` if there was nothing to remove.
    pub async fn remove_pending_group_request(
        &self,
        group: &GroupName,
        user: &UserId,
    ) -> Result<bool> {
        Ok(self
            .store
            .set_remove(&keys::group_requests(group), user.as_str())
            .await?)
    }

    // ------------------------------------------------------------------
    // Read models
    // ------------------------------------------------------------------

    pub async fn group_admin_ids(&self, group: &GroupName) -> Result<Vec<UserId>> {
        let ids = self.store.set_members(&keys::group_admins(group)).await?;
        Ok(ids.into_iter().map(UserId::new).collect())
    }

    pub async fn group_member_ids(&self, group: &GroupName) -> Result<Vec<UserId>> {
        let ids = self.store.set_members(&keys::group_members(group)).await?;
        Ok(ids.into_iter().map(UserId::new).collect())
    }

    /// Member records ordered by display name.
    pub async fn group_members(&self, group: &GroupName) -> Result<Vec<User>> {
        let ids = self.store.set_members(&keys::group_members(group)).await?;
        let mut members = self.users(ids).await?;
        sort_users(&mut members);
        Ok(members)
    }

    /// Friends ordered by display name.
    pub async fn friends_of(&self, user: &UserId) -> Result<Vec<User>> {
        let ids = self.store.set_members(&keys::friends(user)).await?;
        let mut friends = self.users(ids).await?;
        sort_users(&mut friends);
        Ok(friends)
    }

    /// Joined groups ordered by name.
    pub async fn groups_of(&self, user: &UserId) -> Result<Vec<Group>> {
        let names = self.store.set_members(&keys::user_groups(user)).await?;
        let mut groups: Vec<Group> = names
            .iter()
            .filter_map(|raw| match GroupName::parse(raw) {
                Ok(name) => Some(Group { name }),
                Err(e) => {
                    warn!(user = %user, group = %raw, error = %e, "skipping malformed group name");
                    None
                }
            })
            .collect();
        groups.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(groups)
    }

    pub async fn incoming_friend_requests(&self, user: &UserId) -> Result<Vec<FriendRequestPayload>> {
        let ids = self
            .store
            .set_members(&keys::incoming_friend_requests(user))
            .await?;
        Ok(self
            .users(ids)
            .await?
            .into_iter()
            .map(|sender| FriendRequestPayload {
                sender_id: sender.id,
                sender_email: sender.email,
            })
            .collect())
    }

    /// Groups among `user`'s groups that `user` administers.
    pub async fn administered_groups(&self, user: &UserId) -> Result<Vec<GroupName>> {
        let mut administered = Vec::new();
        for group in self.groups_of(user).await? {
            if self.is_group_admin(&group.name, user).await? {
                administered.push(group.name);
            }
        }
        Ok(administered)
    }

    /// Pending join requests across every group the viewer administers.
    pub async fn incoming_group_requests(&self, admin: &UserId) -> Result<Vec<GroupRequestPayload>> {
        let mut requests = Vec::new();
        for group in self.administered_groups(admin).await? {
            let ids = self.store.set_members(&keys::group_requests(&group)).await?;
            for candidate in self.users(ids).await? {
                requests.push(GroupRequestPayload {
                    sender_id: candidate.id,
                    sender_email: candidate.email,
                    group_name: group.clone(),
                });
            }
        }
        Ok(requests)
    }

    /// Authoritative state for a new viewer session.
    pub async fn session_snapshot(&self, user: &UserId) -> Result<SessionSnapshot> {
        let record = self.require_user(user).await?;
        let friends = self.friends_of(user).await?;
        let groups = self.groups_of(user).await?;
        let unseen_friend_requests = self
            .store
            .set_len(&keys::incoming_friend_requests(user))
            .await?;

        let mut unseen_group_requests = 0;
        for group in self.administered_groups(user).await? {
            unseen_group_requests += self.store.set_len(&keys::group_requests(&group)).await?;
        }

        Ok(SessionSnapshot {
            user: record,
            friends,
            groups,
            unseen_friend_requests,
            unseen_group_requests,
        })
    }
}

fn sort_users(users: &mut [User]) {
    users.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatterbox_store::MemoryStore;

    fn user(id: &str, name: &str) -> User {
        User {
            id: id.into(),
            name: name.into(),
            email: format!("{id}@x.com"),
            image: format!("https://img.example/{id}.png"),
        }
    }

    fn relations() -> Relations {
        Relations::new(Arc::new(MemoryStore::new()))
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  A@X.com ").unwrap(), "a@x.com");
        assert!(normalize_email("nobody").is_err());
        assert!(normalize_email("@x.com").is_err());
        assert!(normalize_email("a@").is_err());
    }

    #[tokio::test]
    async fn test_user_lookup_by_email() {
        let rel = relations();
        let alice = user("u1", "Alice");
        rel.put_user(&alice).await.unwrap();

        assert_eq!(rel.user_by_email("U1@x.com").await.unwrap(), Some(alice.clone()));
        assert_eq!(rel.user_by_email("nobody@x.com").await.unwrap(), None);
        assert_eq!(rel.require_user(&"u1".into()).await.unwrap(), alice);
        assert!(matches!(
            rel.require_user(&"u9".into()).await,
            Err(ChatError::NotFound(_))
        ));

        let mut clashing = user("u1--u2", "Eve");
        clashing.email = "eve@x.com".into();
        assert!(matches!(
            rel.put_user(&clashing).await,
            Err(ChatError::InvalidInput(_))
        ));
        assert_eq!(rel.user_by_email("eve@x.com").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_friendship_is_symmetric() {
        let rel = relations();
        let (a, b) = (UserId::from("u1"), UserId::from("u2"));
        assert!(!rel.is_friend(&a, &b).await.unwrap());
        rel.add_friendship(&a, &b).await.unwrap();
        assert!(rel.is_friend(&a, &b).await.unwrap());
        assert!(rel.is_friend(&b, &a).await.unwrap());

        rel.remove_friendship(&b, &a).await.unwrap();
        assert!(!rel.is_friend(&a, &b).await.unwrap());
        assert!(!rel.is_friend(&b, &a).await.unwrap());
    }

    #[tokio::test]
    async fn test_membership_removal_clears_both_sides() {
        let rel = relations();
        let group = GroupName::parse("night-owls").unwrap();
        let me = UserId::from("u1");

        assert!(rel.register_group(&group).await.unwrap());
        rel.add_group_member(&group, &me).await.unwrap();
        rel.add_group_admin(&group, &me).await.unwrap();

        rel.remove_group_admin(&group, &me).await.unwrap();
        rel.remove_group_member(&group, &me).await.unwrap();
        rel.unregister_group(&group).await.unwrap();

        assert!(!rel.is_group_admin(&group, &me).await.unwrap());
        assert!(!rel.is_group_member(&group, &me).await.unwrap());
        assert!(rel.groups_of(&me).await.unwrap().is_empty());
        assert!(!rel.group_exists(&group).await.unwrap());
        // The name can be claimed again.
        assert!(rel.register_group(&group).await.unwrap());
    }

    #[tokio::test]
    async fn test_pending_request_claim() {
        let rel = relations();
        let (a, b) = (UserId::from("u1"), UserId::from("u2"));
        assert!(rel.add_pending_friend_request(&a, &b).await.unwrap());
        assert!(!rel.add_pending_friend_request(&a, &b).await.unwrap());
        assert!(rel.has_pending_friend_request(&a, &b).await.unwrap());
        assert!(!rel.has_pending_friend_request(&b, &a).await.unwrap());

        assert!(rel.remove_pending_friend_request(&a, &b).await.unwrap());
        assert!(!rel.remove_pending_friend_request(&a, &b).await.unwrap());
    }

    #[tokio::test]
    async fn test_rosters_are_sorted() {
        let rel = relations();
        let me = UserId::from("u0");
        for (id, name) in [("u1", "Zed"), ("u2", "Amy"), ("u3", "Max")] {
            rel.put_user(&user(id, name)).await.unwrap();
            rel.add_friendship(&me, &id.into()).await.unwrap();
        }
        let names: Vec<String> = rel
            .friends_of(&me)
            .await
            .unwrap()
            .into_iter()
            .map(|u| u.name)
            .collect();
        assert_eq!(names, vec!["Amy", "Max", "Zed"]);

        for name in ["zebras", "ants", "moths"] {
            rel.add_group_member(&GroupName::parse(name).unwrap(), &me)
                .await
                .unwrap();
        }
        let groups: Vec<String> = rel
            .groups_of(&me)
            .await
            .unwrap()
            .into_iter()
            .map(|g| g.name.to_string())
            .collect();
        assert_eq!(groups, vec!["ants", "moths", "zebras"]);
    }

    #[tokio::test]
    async fn test_session_snapshot_counts() {
        let rel = relations();
        let me = user("u1", "Alice");
        rel.put_user(&me).await.unwrap();
        rel.put_user(&user("u2", "Bob")).await.unwrap();
        rel.put_user(&user("u3", "Cid")).await.unwrap();

        rel.add_pending_friend_request(&"u2".into(), &me.id).await.unwrap();

        let owned = GroupName::parse("owned").unwrap();
        rel.register_group(&owned).await.unwrap();
        rel.add_group_member(&owned, &me.id).await.unwrap();
        rel.add_group_admin(&owned, &me.id).await.unwrap();
        rel.add_pending_group_request(&owned, &"u2".into()).await.unwrap();
        rel.add_pending_group_request(&owned, &"u3".into()).await.unwrap();

        // Pending requests of a group the viewer merely belongs to do not count.
        let joined = GroupName::parse("joined").unwrap();
        rel.register_group(&joined).await.unwrap();
        rel.add_group_member(&joined, &me.id).await.unwrap();
        rel.add_pending_group_request(&joined, &"u3".into()).await.unwrap();

        let snapshot = rel.session_snapshot(&me.id).await.unwrap();
        assert_eq!(snapshot.user, me);
        assert_eq!(snapshot.unseen_friend_requests, 1);
        assert_eq!(snapshot.unseen_group_requests, 2);
        assert_eq!(snapshot.groups.len(), 2);

        let requests = rel.incoming_group_requests(&me.id).await.unwrap();
        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|r| r.group_name == owned));
    }
}
