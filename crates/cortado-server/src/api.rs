//! The ops HTTP surface.
//!
//! Three small things live here: the keep-alive probe hosting providers
//! ping, a health/status pair for monitoring, and the platform's signed
//! interaction webhook (answers the PING handshake; everything else is told
//! the deployment runs in gateway mode).

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::{get, post},
    Json, Router,
};
use ed25519_dalek::{Signature, VerifyingKey};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use cortado_core::{RequestRegistry, SharedDb};
use cortado_shared::constants::APP_NAME;
use cortado_store::ListScope;

use crate::config::ServerConfig;
use crate::error::ServerError;

/// Interaction type the platform uses for its reachability handshake.
const INTERACTION_PING: u64 = 1;
/// Response type: PONG.
const RESPONSE_PONG: u64 = 1;
/// Response type: plain channel message.
const RESPONSE_MESSAGE: u64 = 4;

#[derive(Clone)]
pub struct AppState {
    pub db: SharedDb,
    pub registry: Arc<RequestRegistry>,
    pub status_line: tokio::sync::watch::Receiver<String>,
    pub config: Arc<ServerConfig>,
    pub started: Instant,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(keep_alive))
        .route("/health", get(health_check))
        .route("/status", get(server_status))
        .route("/interactions", post(interactions))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Serialize)]
struct StatusResponse {
    open_requests: u64,
    active_chats: u64,
    status_line: String,
    uptime_secs: u64,
}

/// Hosting providers ping this to keep the process alive.
async fn keep_alive() -> &'static str {
    "Cortado relay is running!"
}

async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn server_status(
    State(state): State<AppState>,
) -> Result<Json<StatusResponse>, ServerError> {
    let open_requests = state
        .registry
        .open_request_count(ListScope::Global)
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?;

    let active_chats = {
        let db = state.db.lock().await;
        db.count_active_chats()
            .map_err(|e| ServerError::Internal(e.to_string()))?
    };

    Ok(Json(StatusResponse {
        open_requests,
        active_chats,
        status_line: state.status_line.borrow().clone(),
        uptime_secs: state.started.elapsed().as_secs(),
    }))
}

/// The platform's signed interaction webhook.
///
/// Verifies the request signature, answers PING with PONG, and points every
/// other interaction at the gateway deployment.
async fn interactions(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ServerError> {
    let Some(key) = state.config.verify_key else {
        warn!("interaction received but no VERIFY_KEY is configured");
        return Err(ServerError::InvalidSignature);
    };

    let signature = header_str(&headers, "x-signature-ed25519")?;
    let timestamp = header_str(&headers, "x-signature-timestamp")?;

    if !verify_signature(&key, timestamp, &body, signature) {
        warn!("invalid interaction signature");
        return Err(ServerError::InvalidSignature);
    }

    let interaction: serde_json::Value = serde_json::from_slice(&body)
        .map_err(|e| ServerError::BadRequest(format!("invalid interaction body: {e}")))?;

    Ok(Json(interaction_reply(&interaction)))
}

/// Answer a verified interaction: PONG for the PING handshake, a gateway-mode
/// pointer for everything else.
fn interaction_reply(interaction: &serde_json::Value) -> serde_json::Value {
    let kind = interaction.get("type").and_then(|t| t.as_u64());

    if kind == Some(INTERACTION_PING) {
        info!("interaction PING, answering PONG");
        return serde_json::json!({ "type": RESPONSE_PONG });
    }

    info!(kind = ?kind, "non-ping interaction on the webhook endpoint");
    serde_json::json!({
        "type": RESPONSE_MESSAGE,
        "data": {
            "content": format!(
                "{APP_NAME} runs in gateway mode; use the slash commands directly."
            ),
        },
    })
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Result<&'a str, ServerError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ServerError::BadRequest(format!("missing {name} header")))
}

/// Check an interaction signature: Ed25519 over `timestamp || body`.
fn verify_signature(key: &[u8; 32], timestamp: &str, body: &[u8], signature_hex: &str) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_bytes(key) else {
        return false;
    };

    let Ok(signature_bytes) = hex::decode(signature_hex) else {
        return false;
    };
    let Ok(signature_array) = <[u8; 64]>::try_from(signature_bytes.as_slice()) else {
        return false;
    };
    let signature = Signature::from_bytes(&signature_array);

    let mut message = Vec::with_capacity(timestamp.len() + body.len());
    message.extend_from_slice(timestamp.as_bytes());
    message.extend_from_slice(body);

    verifying_key.verify_strict(&message, &signature).is_ok()
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting ops HTTP server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
