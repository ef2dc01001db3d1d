//! # chatterbox-server
//!
//! HTTP front of the ChatterBox coordination core.
//!
//! This binary wires together:
//! - the configured **Store Adapter** (in-memory or SQLite)
//! - the in-process **event relay** that fans live events out to topics
//! - the **REST API** (axum) for requests, groups and messages, plus the
//!   `/ws` live event feed

use tracing::info;
use tracing_subscriber::EnvFilter;

use chatterbox_net::LocalRelay;
use chatterbox_server::api::{self, AppState};
use chatterbox_server::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,chatterbox_server=debug")),
        )
        .init();

    info!("Starting ChatterBox server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 3. Initialize subsystems
    // -----------------------------------------------------------------------
    let store = config.open_store()?;
    let relay = LocalRelay::new();
    let http_addr = config.http_addr;
    let app_state = AppState::new(store, relay, config);

    // -----------------------------------------------------------------------
    // 4. Run the HTTP API server (blocks until shutdown)
    // -----------------------------------------------------------------------
    tokio::select! {
        result = api::serve(app_state, http_addr) => {
            if let Err(e) = result {
                tracing::error!(error = %e, "HTTP server failed");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
