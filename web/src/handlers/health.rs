//! Health check endpoints.

use crate::state::AppState;
use axum::{Json, extract::State, http::StatusCode};
use event_notify_runtime::health::{HealthCheck, HealthReport, HealthStatus};

/// Liveness: the process is up. Dependencies are not checked.
///
/// ```text
/// GET /health
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, &'static str) {
    (StatusCode::OK, "ok")
}

/// Readiness: live bridge and delay store.
///
/// - 200 OK: healthy or degraded
/// - 503 Service Unavailable: any component unhealthy
///
/// ```text
/// GET /health/ready
/// ```
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let bridge =
        HealthCheck::healthy("live_bridge").with_metadata("connections", state.registry.len().await);
    let store = HealthCheck::delay_store(state.delay_store.as_ref()).await;

    let report = HealthReport::new(vec![bridge, store]);
    let status = match report.status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status, Json(report))
}
