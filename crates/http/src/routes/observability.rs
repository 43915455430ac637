//! Observability endpoints for health checks and internal metrics

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use tracing::instrument;

use waypoint_core::tracing::metrics::{all_counters, all_gauges};

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = serde_json::Value)
    ),
    tag = "observability"
)]
#[instrument(name = "health_check")]
pub async fn health_handler() -> Response {
    let health_status = json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339(),
        "service": "waypoint-http",
        "version": env!("CARGO_PKG_VERSION"),
    });

    (StatusCode::OK, axum::Json(health_status)).into_response()
}

/// Internal metrics dump
#[utoipa::path(
    get,
    path = "/metrics",
    responses(
        (status = 200, description = "Internal pipeline metrics", body = serde_json::Value)
    ),
    tag = "observability"
)]
pub async fn metrics_handler() -> Response {
    let metrics = json!({
        "counters": all_counters(),
        "gauges": all_gauges(),
    });

    (StatusCode::OK, axum::Json(metrics)).into_response()
}
