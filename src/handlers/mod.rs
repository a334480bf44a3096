// =============================================================================
// HANDLERS
// =============================================================================
// HTTP request handlers, one module per resource. Shared helpers live with
// the resource they belong to (e.g. product cache keys in `products`).

pub mod admin;
pub mod auth;
pub mod cart;
pub mod orders;
pub mod products;
pub mod reviews;

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::models::{HealthResponse, ReadinessChecks, ReadinessResponse};
use crate::AppState;

/// Liveness probe.
///
/// GET /health
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        service: "storefront-service".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness probe: checks PostgreSQL and Redis connectivity.
///
/// GET /ready
pub async fn readiness_check(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ReadinessResponse>, StatusCode> {
    let db_healthy = state.db.health_check().await;

    let redis_healthy = redis::cmd("PING")
        .query_async::<_, String>(&mut state.redis.clone())
        .await
        .is_ok();

    let all_healthy = db_healthy && redis_healthy;
    let status = if all_healthy { "ready" } else { "not_ready" };

    let response = ReadinessResponse {
        status: status.to_string(),
        checks: ReadinessChecks {
            database: db_healthy,
            redis: redis_healthy,
        },
    };

    if all_healthy {
        Ok(Json(response))
    } else {
        Err(StatusCode::SERVICE_UNAVAILABLE)
    }
}

/// Prometheus metrics in text exposition format.
///
/// GET /metrics
pub async fn metrics_handler(State(state): State<Arc<AppState>>) -> String {
    state.metrics_handle.render()
}
