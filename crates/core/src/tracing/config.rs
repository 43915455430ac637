//! Configuration for tracing and instrumentation

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Main instrumentation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentationConfig {
    /// Service name for tracing
    pub service_name: String,
    /// Service version
    pub service_version: String,
    /// Log level filter (e.g., "info", "debug", "trace")
    pub log_level: String,
    /// Optional OTLP configuration for OpenTelemetry export
    #[serde(default)]
    pub otlp: Option<OtlpConfig>,
}

/// OpenTelemetry Protocol (OTLP) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OtlpConfig {
    /// OTLP endpoint URL
    pub endpoint: String,
    /// Optional headers to send with OTLP requests
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
}

impl Default for InstrumentationConfig {
    fn default() -> Self {
        Self {
            service_name: "waypoint".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            log_level: "info".to_string(),
            otlp: None,
        }
    }
}

impl InstrumentationConfig {
    /// Build a configuration from `RUST_LOG` / `OTLP_ENDPOINT` environment variables
    pub fn from_env(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            otlp: std::env::var("OTLP_ENDPOINT").ok().map(|endpoint| OtlpConfig {
                endpoint,
                headers: None,
            }),
        }
    }
}
