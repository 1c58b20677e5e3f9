//! Health check endpoints.
//!
//! These endpoints are used by load balancers and monitoring systems
//! to verify service health.

use crate::state::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: &'static str,
    /// Service version
    pub version: &'static str,
}

/// Liveness check. Does NOT check dependencies.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
#[allow(clippy::unused_async)]
pub async fn health_check() -> (StatusCode, Json<HealthResponse>) {
    (
        StatusCode::OK,
        Json(HealthResponse {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
        }),
    )
}

/// Readiness check response.
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    /// Overall readiness status
    pub ready: bool,
    /// Database connectivity (`true` when running without a database)
    pub database: bool,
}

/// Readiness check: 200 when the database answers, 503 otherwise.
///
/// # Endpoint
///
/// ```text
/// GET /ready
/// ```
pub async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    let database = match &state.database {
        Some(pool) => match showtime_postgres::ping(pool).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(error = %e, "Readiness probe: database unavailable");
                false
            }
        },
        None => true,
    };

    let status = if database {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadinessResponse {
            ready: database,
            database,
        }),
    )
}
