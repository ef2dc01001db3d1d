//! The Store Adapter contract.
//!
//! Typed accessors over a key/value store with set and sorted-set values,
//! modelled on the Redis commands the chat backend relies on. No business
//! logic lives behind this trait.

use async_trait::async_trait;

use crate::error::Result;

#[async_trait]
pub trait Store: Send + Sync {
    /// Whether any value (scalar, set or sorted set) is stored under `key`.
    async fn exists(&self, key: &str) -> Result<bool>;

    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    /// All members of a set, in lexicographic order. Empty if absent.
    async fn set_members(&self, key: &str) -> Result<Vec<String>>;

    /// Returns `true` if the member was newly added.
    async fn set_add(&self, key: &str, member: &str) -> Result<bool>;

    async fn set_is_member(&self, key: &str, member: &str) -> Result<bool>;

    /// Returns `true` if the member was present and has been removed. This
    /// is atomic: of two concurrent removals of the same member exactly one
    /// observes `true`.
    async fn set_remove(&self, key: &str, member: &str) -> Result<bool>;

    async fn set_len(&self, key: &str) -> Result<usize>;

    /// Inclusive range over a sorted set ordered by score, ties in insertion
    /// order. Negative indices count from the end (`-1` is the last member).
    async fn sorted_set_range(&self, key: &str, start: i64, end: i64) -> Result<Vec<String>>;

    /// Returns `true` if the member was newly added; an existing member is
    /// re-scored and `false` is returned.
    async fn sorted_set_add(&self, key: &str, score: i64, member: &str) -> Result<bool>;
}
