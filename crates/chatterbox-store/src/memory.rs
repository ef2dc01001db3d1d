//! In-process [`Store`] backed by a `HashMap` behind a mutex.
//!
//! Every operation takes the lock once, so each call is atomic with respect
//! to every other call. Empty sets and sorted sets are removed, matching the
//! behaviour of the Redis commands the adapter mirrors.

use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::adapter::Store;
use crate::error::{Result, StoreError};
use crate::range;

#[derive(Debug)]
enum Entry {
    Value(String),
    Set(BTreeSet<String>),
    Sorted(SortedSet),
}

#[derive(Debug, Default)]
struct SortedSet {
    /// `(score, insertion sequence, member)`, kept sorted.
    members: Vec<(i64, u64, String)>,
    next_seq: u64,
}

impl SortedSet {
    fn add(&mut self, score: i64, member: &str) -> bool {
        if let Some(existing) = self.members.iter_mut().find(|(_, _, m)| m == member) {
            existing.0 = score;
            self.members.sort();
            return false;
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        let pos = self
            .members
            .partition_point(|(s, q, _)| (*s, *q) < (score, seq));
        self.members.insert(pos, (score, seq, member.to_string()));
        true
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
    unavailable: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: while set, every call fails with
    /// [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    fn with_entries<T>(&self, f: impl FnOnce(&mut HashMap<String, Entry>) -> Result<T>) -> Result<T> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable);
        }
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        f(&mut entries)
    }
}

fn wrong_type(key: &str, expected: &'static str) -> StoreError {
    StoreError::WrongType {
        key: key.to_string(),
        expected,
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn exists(&self, key: &str) -> Result<bool> {
        self.with_entries(|entries| Ok(entries.contains_key(key)))
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.with_entries(|entries| match entries.get(key) {
            None => Ok(None),
            Some(Entry::Value(v)) => Ok(Some(v.clone())),
            Some(_) => Err(wrong_type(key, "string")),
        })
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.with_entries(|entries| {
            entries.insert(key.to_string(), Entry::Value(value.to_string()));
            Ok(())
        })
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        self.with_entries(|entries| match entries.get(key) {
            None => Ok(Vec::new()),
            Some(Entry::Set(set)) => Ok(set.iter().cloned().collect()),
            Some(_) => Err(wrong_type(key, "set")),
        })
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<bool> {
        self.with_entries(|entries| {
            match entries
                .entry(key.to_string())
                .or_insert_with(|| Entry::Set(BTreeSet::new()))
            {
                Entry::Set(set) => Ok(set.insert(member.to_string())),
                _ => Err(wrong_type(key, "set")),
            }
        })
    }

    async fn set_is_member(&self, key: &str, member: &str) -> Result<bool> {
        self.with_entries(|entries| match entries.get(key) {
            None => Ok(false),
            Some(Entry::Set(set)) => Ok(set.contains(member)),
            Some(_) => Err(wrong_type(key, "set")),
        })
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<bool> {
        self.with_entries(|entries| {
            let (removed, now_empty) = match entries.get_mut(key) {
                None => return Ok(false),
                Some(Entry::Set(set)) => (set.remove(member), set.is_empty()),
                Some(_) => return Err(wrong_type(key, "set")),
            };
            if now_empty {
                entries.remove(key);
            }
            Ok(removed)
        })
    }

    async fn set_len(&self, key: &str) -> Result<usize> {
        self.with_entries(|entries| match entries.get(key) {
            None => Ok(0),
            Some(Entry::Set(set)) => Ok(set.len()),
            Some(_) => Err(wrong_type(key, "set")),
        })
    }

    async fn sorted_set_range(&self, key: &str, start: i64, end: i64) -> Result<Vec<String>> {
        self.with_entries(|entries| match entries.get(key) {
            None => Ok(Vec::new()),
            Some(Entry::Sorted(zset)) => {
                let window = range::resolve(zset.members.len(), start, end);
                Ok(zset.members[window]
                    .iter()
                    .map(|(_, _, m)| m.clone())
                    .collect())
            }
            Some(_) => Err(wrong_type(key, "sorted set")),
        })
    }

    async fn sorted_set_add(&self, key: &str, score: i64, member: &str) -> Result<bool> {
        self.with_entries(|entries| {
            match entries
                .entry(key.to_string())
                .or_insert_with(|| Entry::Sorted(SortedSet::default()))
            {
                Entry::Sorted(zset) => Ok(zset.add(score, member)),
                _ => Err(wrong_type(key, "sorted set")),
            }
        })
    }
}
