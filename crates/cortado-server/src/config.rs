//! Server configuration loaded from environment variables.
//!
//! All settings have sensible defaults so the server can start with zero
//! configuration for local development.

use std::net::SocketAddr;
use std::path::PathBuf;

use cortado_shared::constants::STATUS_INTERVAL_SECS;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address for the HTTP (axum) ops server.
    /// Env: `HTTP_ADDR`
    /// Default: `0.0.0.0:8080`
    pub http_addr: SocketAddr,

    /// Explicit database file path. When unset the platform data directory
    /// is used.
    /// Env: `DATABASE_PATH`
    pub database_path: Option<PathBuf>,

    /// Ed25519 public key the platform signs interaction webhooks with
    /// (hex-encoded, 64 chars).
    /// Env: `VERIFY_KEY`
    /// Default: unset — the interactions endpoint rejects everything.
    pub verify_key: Option<[u8; 32]>,

    /// Application client id, used to print the invite URL at startup.
    /// Env: `CLIENT_ID`
    pub client_id: Option<String>,

    /// Seconds between presence/status updates.
    /// Env: `STATUS_INTERVAL_SECS`
    /// Default: `300`
    pub status_interval_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_addr: ([0, 0, 0, 0], 8080).into(),
            database_path: None,
            verify_key: None,
            client_id: None,
            status_interval_secs: STATUS_INTERVAL_SECS,
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(addr) = std::env::var("HTTP_ADDR") {
            if let Ok(parsed) = addr.parse::<SocketAddr>() {
                config.http_addr = parsed;
            } else {
                tracing::warn!(value = %addr, "Invalid HTTP_ADDR, using default");
            }
        }

        if let Ok(path) = std::env::var("DATABASE_PATH") {
            if !path.is_empty() {
                config.database_path = Some(PathBuf::from(path));
            }
        }

        if let Ok(hex_key) = std::env::var("VERIFY_KEY") {
            match parse_hex_key(&hex_key) {
                Ok(key) => config.verify_key = Some(key),
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        "Invalid VERIFY_KEY, interactions endpoint stays disabled"
                    );
                }
            }
        }

        if let Ok(id) = std::env::var("CLIENT_ID") {
            if !id.is_empty() {
                config.client_id = Some(id);
            }
        }

        if let Ok(val) = std::env::var("STATUS_INTERVAL_SECS") {
            if let Ok(secs) = val.parse::<u64>() {
                config.status_interval_secs = secs.max(1);
            }
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }
}

/// Parse a 64-character hex string into a 32-byte array.
pub(crate) fn parse_hex_key(hex_str: &str) -> Result<[u8; 32], String> {
    let hex_str = hex_str.trim();
    if hex_str.len() != 64 {
        return Err(format!("expected 64 hex chars, got {}", hex_str.len()));
    }

    let bytes = hex::decode(hex_str).map_err(|e| format!("invalid hex: {e}"))?;
    let mut key = [0u8; 32];
    key.copy_from_slice(&bytes);
    Ok(key)
}
