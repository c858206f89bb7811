/// Health check endpoint
///
/// Reports whether the server is running and whether its backends answer.
///
/// # Endpoint
///
/// ```text
/// GET /health
/// ```
///
/// # Response
///
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0",
///   "service": "Nation IntentKit API",
///   "database": "connected",
///   "redis": "disabled"
/// }
/// ```
///
/// `database` is `memory` on the in-memory store. A failing store ping turns
/// `status` into `degraded`. Redis does not affect `status`.

use crate::{app::AppState, error::ApiResult};
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

/// Service name reported by `/health`
pub const SERVICE_NAME: &str = "Nation IntentKit API";

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Release version
    pub version: String,

    /// Service name
    pub service: String,

    /// Store status
    pub database: String,

    /// Redis status
    pub redis: String,
}

/// Health check handler
pub async fn health_check(State(state): State<AppState>) -> ApiResult<Json<HealthResponse>> {
    let database = match state.store.ping().await {
        Ok(()) if state.store.backend() == "memory" => "memory",
        Ok(()) => "connected",
        Err(e) => {
            tracing::warn!(error = %e, "Store health check failed");
            "disconnected"
        }
    };

    let redis = match &state.redis {
        None => "disabled",
        Some(client) => match client.ping().await {
            Ok(()) => "connected",
            Err(e) => {
                tracing::warn!(error = %e, "Redis health check failed");
                "disconnected"
            }
        },
    };

    Ok(Json(HealthResponse {
        status: if database == "disconnected" {
            "degraded".to_string()
        } else {
            "healthy".to_string()
        },
        version: state.config.api.release.clone(),
        service: SERVICE_NAME.to_string(),
        database: database.to_string(),
        redis: redis.to_string(),
    }))
}
