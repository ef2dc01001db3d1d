use chatterbox_shared::ChatError;
use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Failed to determine a platform data directory.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Generic I/O error (e.g. creating the database directory).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// A key was used with an operation for a different value type.
    #[error("Key '{key}' does not hold a {expected}")]
    WrongType { key: String, expected: &'static str },

    /// A previous holder of the store lock panicked.
    #[error("Store lock poisoned")]
    Poisoned,

    /// The backing service is not reachable.
    #[error("Store unavailable")]
    Unavailable,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Every store failure is an infrastructure problem from the engines' point
/// of view.
impl From<StoreError> for ChatError {
    fn from(err: StoreError) -> Self {
        ChatError::Infrastructure(err.to_string())
    }
}
