//! Waypoint telemetry ingestion daemon
//!
//! Wires the ingestion routes, correlation and metrics middleware, CORS and
//! timeout layers into a served axum application.

use std::time::Duration;

use axum::http::HeaderValue;
use axum::middleware::from_fn;
use tower_http::cors::{Any, CorsLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use waypoint_http::middleware::{correlation_middleware, metrics_middleware};
use waypoint_http::{AppState, routes};

pub mod config;

pub use config::{ServerConfig, Settings};

/// Result type for daemon operations
pub type Result<T> = std::result::Result<T, DaemonError>;

/// Daemon error types
#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error("Configuration error: {0}")]
    Config(#[from] ::config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Assemble the daemon router
///
/// The ingestion endpoint is called from browser origins, so CORS is always
/// on; an empty origin list allows any origin.
pub fn build_router(server: &ServerConfig) -> axum::Router {
    let cors = if server.cors_origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<HeaderValue> = server
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    routes::router(AppState::new())
        .layer(from_fn(correlation_middleware))
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(
            server.request_timeout_secs,
        )))
        .layer(cors)
}
