// SPDX-FileCopyrightText: 2026 Leadwise Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound webhook listener.
//!
//! The session gateway POSTs raw messages to `/webhook/{tenant_id}`, either a
//! single message object or `{"messages": [...]}`. Each message is normalized
//! and handed to the pipeline through an mpsc channel. When a secret is
//! configured the body must carry `X-Leadwise-Signature: sha256=<hex>`.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{DefaultBodyLimit, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use hmac::{Hmac, Mac};
use leadwise_core::LeadwiseError;
use leadwise_core::types::NormalizedMessage;
use serde_json::{Value, json};
use sha2::Sha256;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

use crate::normalizer::normalize;

type HmacSha256 = Hmac<Sha256>;

/// Header carrying the body signature.
pub const SIGNATURE_HEADER: &str = "x-leadwise-signature";

const MAX_BODY_BYTES: usize = 1024 * 1024;

/// A normalized message tagged with the tenant whose session received it.
#[derive(Debug, Clone)]
pub struct InboundEnvelope {
    pub tenant_id: String,
    pub message: NormalizedMessage,
}

/// Shared state for the webhook handlers.
#[derive(Clone)]
pub struct WebhookState {
    /// Channel into the inbound pipeline.
    pub inbound_tx: mpsc::Sender<InboundEnvelope>,
    /// HMAC secret. `None` disables verification.
    pub secret: Option<Arc<str>>,
    pub start_time: Instant,
}

impl WebhookState {
    pub fn new(inbound_tx: mpsc::Sender<InboundEnvelope>, secret: Option<&str>) -> Self {
        Self {
            inbound_tx,
            secret: secret.map(Arc::from),
            start_time: Instant::now(),
        }
    }
}

/// Listener address.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Verifies a `sha256=<hex>` HMAC signature over `body`.
pub fn verify_signature(secret: &[u8], body: &[u8], signature: &str) -> bool {
    let hex_sig = signature.strip_prefix("sha256=").unwrap_or(signature);
    let Ok(expected) = hex::decode(hex_sig) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

/// Computes the `sha256=<hex>` signature the gateway is expected to send.
pub fn sign(secret: &[u8], body: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(body);
    Some(format!("sha256={}", hex::encode(mac.finalize().into_bytes())))
}

/// Builds the webhook router.
pub fn router(state: WebhookState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/webhook/{tenant_id}", post(post_webhook))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Binds the listener and serves until `cancel` fires.
pub async fn start_server(
    config: &ServerConfig,
    state: WebhookState,
    cancel: CancellationToken,
) -> Result<(), LeadwiseError> {
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| LeadwiseError::Transport {
            message: format!("failed to bind webhook listener to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    info!("webhook listener on {addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| LeadwiseError::Transport {
            message: format!("webhook server error: {e}"),
            source: Some(Box::new(e)),
        })
}

async fn get_health(State(state): State<WebhookState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "uptime_secs": state.start_time.elapsed().as_secs(),
    }))
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

async fn post_webhook(
    State(state): State<WebhookState>,
    Path(tenant_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    if let Some(secret) = &state.secret {
        let signature = headers
            .get(SIGNATURE_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if !verify_signature(secret.as_bytes(), &body, signature) {
            warn!(tenant_id = %tenant_id, "rejected webhook with bad signature");
            return error_response(StatusCode::UNAUTHORIZED, "invalid signature");
        }
    }

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            debug!(error = %e, "webhook body is not JSON");
            return error_response(StatusCode::BAD_REQUEST, "body must be JSON");
        }
    };

    let raw_messages = match payload.get("messages").and_then(Value::as_array) {
        Some(batch) => batch.clone(),
        None => vec![payload],
    };

    let mut accepted = 0usize;
    for raw in &raw_messages {
        let envelope = InboundEnvelope {
            tenant_id: tenant_id.clone(),
            message: normalize(raw),
        };
        if state.inbound_tx.send(envelope).await.is_err() {
            warn!(tenant_id = %tenant_id, "inbound pipeline is not running");
            return error_response(StatusCode::SERVICE_UNAVAILABLE, "pipeline unavailable");
        }
        accepted += 1;
    }

    debug!(tenant_id = %tenant_id, accepted, "webhook messages queued");
    (StatusCode::ACCEPTED, Json(json!({ "accepted": accepted }))).into_response()
}
