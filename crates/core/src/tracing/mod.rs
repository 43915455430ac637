//! Shared tracing functionality for Waypoint
//!
//! Correlation identifiers and instrumentation plumbing used on both sides
//! of the browser/backend boundary.

pub mod config;
pub mod context;
#[cfg(not(target_arch = "wasm32"))]
pub mod init;
pub mod metrics;
pub mod prelude;

pub use context::{ContextError, CorrelationContext, SpanId, TraceId};
