//! Middleware components for HTTP request processing

pub mod correlation;
pub mod metrics;

pub use correlation::{CorrelationExt, correlation_middleware};
pub use metrics::metrics_middleware;
