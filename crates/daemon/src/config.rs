//! Configuration management for the Waypoint daemon

use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::Result;

/// Main daemon configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Address to bind the HTTP server
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,

    /// Allowed CORS origins; empty allows any origin
    #[serde(default)]
    pub cors_origins: Vec<String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_bind_addr() -> SocketAddr {
    "127.0.0.1:8080".parse().expect("valid default bind address")
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            cors_origins: Vec::new(),
            request_timeout_secs: default_timeout_secs(),
        }
    }
}

impl Settings {
    /// Load settings from a config file, with `WAYPOINT__`-prefixed
    /// environment variables taking precedence
    pub fn load_from_file(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("WAYPOINT").separator("__"))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    /// Load settings from environment variables only
    pub fn from_env() -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::Environment::with_prefix("WAYPOINT").separator("__"))
            .build()?;
        Ok(settings.try_deserialize()?)
    }
}
