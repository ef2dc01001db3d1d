//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use chatterbox_shared::constants::{APP_NAME, DEFAULT_HTTP_PORT, DEFAULT_MAX_MESSAGE_LEN};
use chatterbox_store::{Database, MemoryStore, SqliteStore, Store, StoreError};

/// Which Store Adapter backs the engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// In-process maps. State is lost on restart.
    Memory,
    /// SQLite file managed by `chatterbox-store`.
    Sqlite,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "sqlite" => Ok(StoreBackend::Sqlite),
            other => Err(format!("unknown store backend '{other}'")),
        }
    }
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) API server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// Env: `STORE_BACKEND` (`memory` | `sqlite`)
    /// Default: `memory`
    pub store_backend: StoreBackend,

    /// SQLite database file. Only used by the `sqlite` backend.
    /// Env: `DATABASE_PATH`
    /// Default: the platform data directory.
    pub database_path: Option<PathBuf>,

    /// Maximum message length in characters.
    /// Env: `MAX_MESSAGE_LEN`
    /// Default: `2000`
    pub max_message_len: usize,

    /// Human-readable name for this server instance.
    /// Env: `INSTANCE_NAME`
    /// Default: `"ChatterBox"`
    pub instance_name: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], DEFAULT_HTTP_PORT).into(),
            store_backend: StoreBackend::Memory,
            database_path: None,
            max_message_len: DEFAULT_MAX_MESSAGE_LEN,
            instance_name: APP_NAME.to_string(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`ServerConfig::from_env`] with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(addr) = lookup("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(
                    value = %addr,
                    "Invalid HTTP_ADDR, using default {}",
                    config.http_addr
                );
            }
        }

        if let Some(backend) = lookup("STORE_BACKEND") {
            match backend.parse::<StoreBackend>() {
                Ok(parsed) => config.store_backend = parsed,
                Err(e) => tracing::warn!(error = %e, "Invalid STORE_BACKEND, using memory"),
            }
        }

        if let Some(path) = lookup("DATABASE_PATH") {
            if !path.trim().is_empty() {
                config.database_path = Some(PathBuf::from(path));
            }
        }

        if let Some(len) = lookup("MAX_MESSAGE_LEN") {
            match len.parse::<usize>() {
                Ok(parsed) if parsed > 0 => config.max_message_len = parsed,
                _ => tracing::warn!(
                    value = %len,
                    "Invalid MAX_MESSAGE_LEN, using default {}",
                    config.max_message_len
                ),
            }
        }

        if let Some(name) = lookup("INSTANCE_NAME") {
            if !name.trim().is_empty() {
                config.instance_name = name;
            }
        }

        config
    }

    /// Open the configured Store Adapter.
    pub fn open_store(&self) -> Result<Arc<dyn Store>, StoreError> {
        match self.store_backend {
            StoreBackend::Memory => Ok(Arc::new(MemoryStore::new())),
            StoreBackend::Sqlite => {
                let db = match &self.database_path {
                    Some(path) => Database::open_at(path)?,
                    None => Database::new()?,
                };
                tracing::info!(path = ?db.path(), "Opened SQLite store");
                Ok(Arc::new(SqliteStore::new(db)))
            }
        }
    }
}
