/// Health check endpoints
///
/// - `GET /health/live` - Process is up; always 200
/// - `GET /health/ready` - 200 when the database answers, 503 otherwise
/// - `GET /health` - Full report:
///
/// ```text
/// GET /health
/// ```
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "database": "connected",
///   "redis": "not_configured",
///   "revocation_backend": "memory"
/// }
/// ```
///
/// `status` is `degraded` when the database is unreachable or a configured
/// Redis does not answer. Redis being absent is not degraded.

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use taskhub_shared::db::pool;

/// Liveness and readiness response
#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    /// `alive`, `ready` or `not_ready`
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

impl StatusResponse {
    fn new(status: &str) -> Self {
        Self {
            status: status.to_string(),
            timestamp: Utc::now(),
        }
    }
}

pub async fn liveness() -> Json<StatusResponse> {
    Json(StatusResponse::new("alive"))
}

pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<StatusResponse>) {
    match pool::health_check(&state.db).await {
        Ok(()) => (StatusCode::OK, Json(StatusResponse::new("ready"))),
        Err(e) => {
            tracing::warn!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(StatusResponse::new("not_ready")),
            )
        }
    }
}

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,

    /// `connected` or `disconnected`
    pub database: String,

    /// `connected`, `disconnected` or `not_configured`
    pub redis: String,

    /// Where revocations are currently written
    pub revocation_backend: String,
}

pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let database_ok = match pool::health_check(&state.db).await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Database health check failed");
            false
        }
    };

    let redis_status = match &state.redis {
        None => "not_configured",
        Some(client) => match client.ping().await {
            Ok(true) => "connected",
            Ok(false) => "disconnected",
            Err(e) => {
                tracing::warn!(error = %e, "Redis health check failed");
                "disconnected"
            }
        },
    };

    let healthy = database_ok && redis_status != "disconnected";

    Ok(Json(HealthResponse {
        status: if healthy { "healthy" } else { "degraded" }.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: if database_ok { "connected" } else { "disconnected" }.to_string(),
        redis: redis_status.to_string(),
        revocation_backend: state.revocations.backend_name().to_string(),
    }))
}
