//! [`Store`] implementation over a SQLite [`Database`].
//!
//! The connection sits behind a mutex, which serializes every call and
//! makes each adapter operation atomic.

use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::{params, OptionalExtension};

use crate::adapter::Store;
use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::range;

pub struct SqliteStore {
    db: Mutex<Database>,
}

impl SqliteStore {
    pub fn new(db: Database) -> Self {
        Self { db: Mutex::new(db) }
    }

    fn with_db<T>(&self, f: impl FnOnce(&Database) -> Result<T>) -> Result<T> {
        let db = self.db.lock().map_err(|_| StoreError::Poisoned)?;
        f(&db)
    }
}

#[async_trait]
impl Store for SqliteStore {
    async fn exists(&self, key: &str) -> Result<bool> {
        self.with_db(|db| {
            let found: bool = db.conn().query_row(
                "SELECT EXISTS(SELECT 1 FROM kv WHERE key = ?1)
                     OR EXISTS(SELECT 1 FROM set_members WHERE key = ?1)
                     OR EXISTS(SELECT 1 FROM sorted_set_members WHERE key = ?1)",
                params![key],
                |row| row.get(0),
            )?;
            Ok(found)
        })
    }

    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.with_db(|db| {
            let value = db
                .conn()
                .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                    row.get(0)
                })
                .optional()?;
            Ok(value)
        })
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.with_db(|db| {
            db.conn().execute(
                "INSERT INTO kv (key, value) VALUES (?1, ?2)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value",
                params![key, value],
            )?;
            Ok(())
        })
    }

    async fn set_members(&self, key: &str) -> Result<Vec<String>> {
        self.with_db(|db| {
            let mut stmt = db
                .conn()
                .prepare("SELECT member FROM set_members WHERE key = ?1 ORDER BY member ASC")?;
            let rows = stmt.query_map(params![key], |row| row.get::<_, String>(0))?;

            let mut members = Vec::new();
            for row in rows {
                members.push(row?);
            }
            Ok(members)
        })
    }

    async fn set_add(&self, key: &str, member: &str) -> Result<bool> {
        self.with_db(|db| {
            let affected = db.conn().execute(
                "INSERT OR IGNORE INTO set_members (key, member) VALUES (?1, ?2)",
                params![key, member],
            )?;
            Ok(affected > 0)
        })
    }

    async fn set_is_member(&self, key: &str, member: &str) -> Result<bool> {
        self.with_db(|db| {
            let found: bool = db.conn().query_row(
                "SELECT EXISTS(SELECT 1 FROM set_members WHERE key = ?1 AND member = ?2)",
                params![key, member],
                |row| row.get(0),
            )?;
            Ok(found)
        })
    }

    async fn set_remove(&self, key: &str, member: &str) -> Result<bool> {
        self.with_db(|db| {
            let affected = db.conn().execute(
                "DELETE FROM set_members WHERE key = ?1 AND member = ?2",
                params![key, member],
            )?;
            Ok(affected > 0)
        })
    }

    async fn set_len(&self, key: &str) -> Result<usize> {
        self.with_db(|db| {
            let count: i64 = db.conn().query_row(
                "SELECT COUNT(*) FROM set_members WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )?;
            Ok(count as usize)
        })
    }

    async fn sorted_set_range(&self, key: &str, start: i64, end: i64) -> Result<Vec<String>> {
        self.with_db(|db| {
            let len: i64 = db.conn().query_row(
                "SELECT COUNT(*) FROM sorted_set_members WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )?;
            let window = range::resolve(len as usize, start, end);
            if window.is_empty() {
                return Ok(Vec::new());
            }

            let mut stmt = db.conn().prepare(
                "SELECT member FROM sorted_set_members
                 WHERE key = ?1
                 ORDER BY score ASC, seq ASC
                 LIMIT ?2 OFFSET ?3",
            )?;
            let rows = stmt.query_map(
                params![key, window.len() as i64, window.start as i64],
                |row| row.get::<_, String>(0),
            )?;

            let mut members = Vec::new();
            for row in rows {
                members.push(row?);
            }
            Ok(members)
        })
    }

    async fn sorted_set_add(&self, key: &str, score: i64, member: &str) -> Result<bool> {
        self.with_db(|db| {
            let rescored = db.conn().execute(
                "UPDATE sorted_set_members SET score = ?3 WHERE key = ?1 AND member = ?2",
                params![key, member, score],
            )?;
            if rescored > 0 {
                return Ok(false);
            }
            db.conn().execute(
                "INSERT INTO sorted_set_members (key, member, score) VALUES (?1, ?2, ?3)",
                params![key, member, score],
            )?;
            Ok(true)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SqliteStore {
        SqliteStore::new(Database::open_in_memory().expect("in-memory db"))
    }

    #[tokio::test]
    async fn scalar_values() {
        let store = store();
        assert_eq!(store.get("user:u1").await.unwrap(), None);
        assert!(!store.exists("user:u1").await.unwrap());

        store.set("user:u1", "{}").await.unwrap();
        store.set("user:u1", "{\"id\":\"u1\"}").await.unwrap();
        assert_eq!(
            store.get("user:u1").await.unwrap().as_deref(),
            Some("{\"id\":\"u1\"}")
        );
        assert!(store.exists("user:u1").await.unwrap());
    }

    #[tokio::test]
    async fn set_operations() {
        let store = store();
        assert!(store.set_add("friends", "u2").await.unwrap());
        assert!(!store.set_add("friends", "u2").await.unwrap());
        assert!(store.set_add("friends", "u1").await.unwrap());
        assert_eq!(store.set_members("friends").await.unwrap(), vec!["u1", "u2"]);
        assert_eq!(store.set_len("friends").await.unwrap(), 2);
        assert!(store.exists("friends").await.unwrap());

        assert!(store.set_remove("friends", "u1").await.unwrap());
        assert!(!store.set_remove("friends", "u1").await.unwrap());
        assert!(!store.set_is_member("friends", "u1").await.unwrap());
    }

    #[tokio::test]
    async fn sorted_set_range_and_ties() {
        let store = store();
        store.sorted_set_add("log", 2, "b").await.unwrap();
        store.sorted_set_add("log", 1, "a").await.unwrap();
        store.sorted_set_add("log", 2, "c").await.unwrap();

        assert_eq!(
            store.sorted_set_range("log", 0, -1).await.unwrap(),
            vec!["a", "b", "c"]
        );
        assert_eq!(store.sorted_set_range("log", 1, 1).await.unwrap(), vec!["b"]);
        assert!(store.sorted_set_range("log", 5, -1).await.unwrap().is_empty());
        assert!(store.sorted_set_range("missing", 0, -1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");

        {
            let store = SqliteStore::new(Database::open_at(&path).unwrap());
            store.set_add("group:g:group-members", "u1").await.unwrap();
        }

        let store = SqliteStore::new(Database::open_at(&path).unwrap());
        assert!(store
            .set_is_member("group:g:group-members", "u1")
            .await
            .unwrap());
    }
}
