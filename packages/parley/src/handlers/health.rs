use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::warn;

use crate::AppState;
use crate::db::DbStats;
use crate::metrics::MetricsSnapshot;
use crate::models::HealthStatus;

#[derive(Serialize)]
struct MetricsResponse {
    #[serde(flatten)]
    server: MetricsSnapshot,
    /// Absent when the database can't be queried
    database: Option<DbStats>,
}

/// Health check endpoint - returns server status
pub async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let online_users = state.hub.registry().len().await;
    let metrics = state
        .metrics
        .snapshot(online_users, state.hub.registry().stats());

    let status = if metrics.errors.websocket == 0 {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthStatus {
        status,
        version: env!("CARGO_PKG_VERSION"),
        online_users,
    })
}

/// Metrics endpoint - returns detailed server metrics
pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let registry = state.hub.registry();
    let server = state.metrics.snapshot(registry.len().await, registry.stats());
    let database = match state.db.get_stats().await {
        Ok(stats) => Some(stats),
        Err(e) => {
            warn!("Failed to collect database stats: {}", e);
            None
        }
    };
    Json(MetricsResponse { server, database })
}

/// Liveness probe - returns 200 if the server is running
pub async fn health_live_handler() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "alive" }))
}

/// Readiness probe - returns 200 if the database answers
pub async fn health_ready_handler(State(state): State<AppState>) -> Response {
    match state.db.ping().await {
        Ok(()) => Json(serde_json::json!({
            "status": "ready",
            "database": "connected"
        }))
        .into_response(),
        Err(e) => {
            warn!("Readiness check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "status": "not_ready",
                    "database": "disconnected"
                })),
            )
                .into_response()
        }
    }
}
