//! # cortado-server
//!
//! Operational binary for the Cortado matchmaking relay.
//!
//! This binary provides:
//! - the durable store, opened and migrated at startup
//! - the **keep-alive / ops HTTP endpoint** (axum): probe, health, status,
//!   and the platform's signed interaction webhook
//! - the **presence reporter** summarizing open requests on an interval
//! - the invite URL printed at startup when a client id is configured
//!
//! The chat-platform gateway itself is a separate concern: it wires inbound
//! events into [`cortado_core::ChatService`] and implements
//! [`cortado_core::Messenger`] for outbound delivery.

mod api;
mod config;
mod error;
mod oauth;
mod presence;

use std::sync::Arc;
use std::time::Instant;

use tracing::info;
use tracing_subscriber::EnvFilter;

use cortado_core::{shared_db, RequestRegistry};
use cortado_store::Database;

use crate::api::AppState;
use crate::config::ServerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Initialize tracing (respects RUST_LOG env var)
    // -----------------------------------------------------------------------
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,cortado_server=debug")),
        )
        .init();

    info!("Starting Cortado relay server v{}", env!("CARGO_PKG_VERSION"));

    // -----------------------------------------------------------------------
    // 2. Load configuration
    // -----------------------------------------------------------------------
    let config = ServerConfig::from_env();
    info!(?config, "Loaded configuration");

    if let Some(ref client_id) = config.client_id {
        info!(url = %oauth::invite_url(client_id, None), "Invite URL");
    }

    // -----------------------------------------------------------------------
    // 3. Open the durable store
    // -----------------------------------------------------------------------
    let database = match config.database_path {
        Some(ref path) => Database::open_at(path)?,
        None => Database::new()?,
    };
    let db = shared_db(database);

    let registry = Arc::new(RequestRegistry::new(db.clone()));

    // -----------------------------------------------------------------------
    // 4. Spawn the presence reporter
    // -----------------------------------------------------------------------
    let status_line = presence::spawn_reporter(registry.clone(), config.status_interval_secs);

    // -----------------------------------------------------------------------
    // 5. Run the ops HTTP server (blocks until shutdown)
    // -----------------------------------------------------------------------
    let http_addr = config.http_addr;
    let state = AppState {
        db,
        registry,
        status_line,
        config: Arc::new(config),
        started: Instant::now(),
    };

    // tokio::select! ensures that if either the HTTP server or a shutdown
    // signal arrives, we exit cleanly.
    tokio::select! {
        result = api::serve(state, http_addr) => {
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
