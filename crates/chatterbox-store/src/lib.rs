//! # chatterbox-store
//!
//! The Store Adapter: typed key/value, set and sorted-set accessors that the
//! coordination engines run against. Two backends are provided, an
//! in-process [`MemoryStore`] and a SQLite-backed [`SqliteStore`] whose
//! schema is managed by the [`migrations`] runner.

pub mod adapter;
pub mod database;
pub mod memory;
pub mod migrations;
pub mod range;
pub mod sqlite;

mod error;

pub use adapter::Store;
pub use database::Database;
pub use error::StoreError;
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
