//! HTTP routes and handlers

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::{limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing::{debug, error, warn};
use triage_classifiers::ComparisonReport;
use triage_core::{ClassificationResult, Ticket};

use crate::security::verify_signature;
use crate::state::AppState;
use crate::webhook::{process_event, WebhookEvent};

pub fn create_router(state: AppState) -> Router {
    let body_limit = state.config.server.max_body_bytes;

    Router::new()
        .route("/health", get(health_check))
        .route("/metrics", get(metrics))
        .route("/stats", get(stats))
        .route("/webhook", post(webhook))
        .route("/classify", post(classify))
        .route("/compare", post(compare))
        .fallback(fallback)
        .layer(RequestBodyLimitLayer::new(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}

async fn metrics(State(state): State<AppState>) -> String {
    state.metrics_handle.render()
}

async fn stats(State(state): State<AppState>) -> Result<Json<Value>, AppError> {
    let window_days = state.config.server.stats_window_days;
    let priorities = state.store.priority_stats(window_days).await?;
    let snapshot = state.metrics.snapshot();

    Ok(Json(json!({
        "mode": state.selector.mode(),
        "model_available": state.selector.model_available(),
        "avg_latency_us": snapshot.avg_latency_us(),
        "fallback_rate": snapshot.fallback_rate(),
        "counters": snapshot,
        "priorities": priorities,
    })))
}

/// Support platform webhook
///
/// The body is taken raw so the signature is checked over the exact bytes
/// that were sent.
async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    if let Some(secret) = state.config.webhook.secret() {
        let provided = headers
            .get(state.config.webhook.signature_header.as_str())
            .and_then(|v| v.to_str().ok());
        verify_signature(secret.as_bytes(), &body, provided).map_err(|e| {
            warn!("Rejected webhook: {}", e);
            AppError::Unauthorized(e.to_string())
        })?;
    }

    let event: WebhookEvent = serde_json::from_slice(&body)?;
    state.metrics.record_event(&event.kind);

    if !state.config.webhook.handled_events.contains(&event.kind) {
        debug!("Ignoring webhook event type {}", event.kind);
        state.metrics.record_ignored();
        return Ok(Json(json!({
            "status": "ignored",
            "event_type": event.kind,
        })));
    }

    let outcome = process_event(&state, &event).await;
    Ok(Json(json!({
        "status": "processed",
        "outcome": outcome,
    })))
}

/// Ad-hoc ticket for the diagnostic endpoints
#[derive(Debug, Deserialize)]
struct ClassifyRequest {
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    customer_tier: String,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
}

impl ClassifyRequest {
    fn into_ticket(self) -> Ticket {
        let id = self
            .id
            .unwrap_or_else(|| format!("adhoc_{}", uuid::Uuid::new_v4()));
        Ticket::new(id, self.body)
            .with_title(self.title)
            .with_tier(self.customer_tier)
            .created_at(self.created_at.unwrap_or_else(Utc::now))
    }
}

/// Classify without labeling or persisting
async fn classify(
    State(state): State<AppState>,
    Json(req): Json<ClassifyRequest>,
) -> Json<ClassificationResult> {
    let ticket = req.into_ticket();
    Json(state.selector.classify(&ticket).await)
}

/// Run both classifiers side by side
async fn compare(
    State(state): State<AppState>,
    Json(req): Json<ClassifyRequest>,
) -> Json<ComparisonReport> {
    let ticket = req.into_ticket();
    Json(state.selector.compare(&ticket).await)
}

async fn fallback() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": {
                "message": "Not found",
                "type": "invalid_request_error",
            }
        })),
    )
}

/// Application error type
#[derive(Debug)]
pub enum AppError {
    InvalidRequest(String),
    Unauthorized(String),
    InternalError(String),
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::InvalidRequest(err.to_string())
    }
}

impl From<triage_core::Error> for AppError {
    fn from(err: triage_core::Error) -> Self {
        match err {
            triage_core::Error::InvalidInput(msg) => AppError::InvalidRequest(msg),
            other => AppError::InternalError(other.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            AppError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, "invalid_request_error", msg),
            AppError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "authentication_error", msg),
            AppError::InternalError(msg) => {
                error!("Internal error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", msg)
            }
        };

        let body = json!({
            "error": {
                "message": message,
                "type": kind,
            }
        });

        (status, Json(body)).into_response()
    }
}
