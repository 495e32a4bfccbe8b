//! Health check HTTP route handlers
//!
//! - `GET /health` - Simple liveness check (returns 200 OK)
//! - `GET /health/live` - Kubernetes-style liveness check
//! - `GET /health/ready` - Readiness check (pings the backing store)

use std::sync::Arc;
use std::time::Instant;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use blogroll_shared_config::StorageBackend;
use serde::Serialize;

use crate::models::EntityKind;
use crate::repositories::Fetcher;

/// Shared application state for health check handlers
#[derive(Clone)]
pub struct HealthState {
    /// Backing store pinged by the readiness check
    pub fetcher: Arc<dyn Fetcher>,
    /// Which backend the fetcher talks to
    pub storage: StorageBackend,
}

impl HealthState {
    pub fn new(fetcher: Arc<dyn Fetcher>, storage: StorageBackend) -> Self {
        Self { fetcher, storage }
    }
}

/// Status of the backing store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Healthy,
    Unhealthy,
}

/// Body of the readiness check
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessResponse {
    pub status: ServiceStatus,
    pub storage: String,
    pub response_time_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Create health check router
pub fn health_router(state: HealthState) -> Router {
    Router::new()
        .route("/", get(simple_health))
        .route("/live", get(liveness_check))
        .route("/ready", get(readiness_check))
        .with_state(state)
}

/// Simple health check - always returns OK if the server is running
async fn simple_health() -> &'static str {
    "OK"
}

/// Liveness check for Kubernetes
///
/// Returns 200 if the server process is running and can handle requests.
/// This should NOT check the backing store - that's what readiness is for.
async fn liveness_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "alive",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Readiness check
///
/// Lists the membership tiers through the backing store, the cheapest read
/// that touches it.
///
/// # Response
/// - 200 OK if the store answered
/// - 503 Service Unavailable otherwise
async fn readiness_check(State(state): State<HealthState>) -> impl IntoResponse {
    let started = Instant::now();
    let result = state.fetcher.fetch_all(EntityKind::MemberType).await;
    let response_time_ms = started.elapsed().as_millis() as u64;

    let (status_code, response) = match result {
        Ok(_) => (
            StatusCode::OK,
            ReadinessResponse {
                status: ServiceStatus::Healthy,
                storage: state.storage.to_string(),
                response_time_ms,
                error: None,
            },
        ),
        Err(e) => {
            tracing::warn!(error = %e, storage = %state.storage, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                ReadinessResponse {
                    status: ServiceStatus::Unhealthy,
                    storage: state.storage.to_string(),
                    response_time_ms,
                    error: Some(e.to_string()),
                },
            )
        }
    };

    (status_code, Json(response))
}
