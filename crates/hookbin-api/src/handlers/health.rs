//! Liveness and readiness probes.
//!
//! `health` and `ping` never touch the store. `ready` runs the backend's
//! lightweight connectivity check.

use std::time::Instant;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use hookbin_core::{models::timestamp, EventStore};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{debug, error, instrument};

use crate::AppState;

/// Readiness response structure.
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    /// Overall readiness
    pub status: ReadinessStatus,
    /// Storage backend in use
    pub backend: &'static str,
    /// When the check ran
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Storage component result
    pub storage: ComponentHealth,
}

/// Overall readiness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ReadinessStatus {
    /// Accepting traffic
    Ready,
    /// Storage is unreachable
    Unavailable,
}

/// Health status for individual components.
#[derive(Debug, Serialize)]
pub struct ComponentHealth {
    /// Component status
    pub status: ComponentStatus,
    /// Error message when the component is down
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Check duration in milliseconds
    pub response_time_ms: u64,
}

/// Component-level health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentStatus {
    /// Component is healthy
    Up,
    /// Component is failing
    Down,
}

/// Runs the readiness checks against the configured store.
async fn check_storage(store: &dyn EventStore) -> ComponentHealth {
    let started = Instant::now();
    let result = store.health_check().await;
    let response_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

    match result {
        Ok(()) => {
            debug!(backend = store.backend_name(), "Storage health check passed");
            ComponentHealth { status: ComponentStatus::Up, message: None, response_time_ms }
        },
        Err(e) => {
            error!(backend = store.backend_name(), error = %e, "Storage health check failed");
            ComponentHealth {
                status: ComponentStatus::Down,
                message: Some(e.to_string()),
                response_time_ms,
            }
        },
    }
}

/// Liveness flag.
pub async fn health() -> Json<Value> {
    Json(json!({ "ok": true }))
}

/// Fixed acknowledgment.
pub async fn ping() -> Json<Value> {
    Json(json!({ "pong": true }))
}

/// Readiness check for orchestration probes.
///
/// Returns 200 while the store answers, 503 otherwise.
#[instrument(name = "readiness_check", skip_all)]
pub async fn readiness_check(State(state): State<AppState>) -> Response {
    let storage = check_storage(state.store.as_ref()).await;

    let (status_code, status) = match storage.status {
        ComponentStatus::Up => (StatusCode::OK, ReadinessStatus::Ready),
        ComponentStatus::Down => (StatusCode::SERVICE_UNAVAILABLE, ReadinessStatus::Unavailable),
    };

    let response = ReadinessResponse {
        status,
        backend: state.store.backend_name(),
        timestamp: state.clock.now(),
        storage,
    };

    (status_code, Json(response)).into_response()
}
