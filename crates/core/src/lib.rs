//! Waypoint core types and utilities
//!
//! Shared between the browser-side instrumentation crate and the ingestion
//! server: the journey data model, trace/correlation identifiers, the
//! telemetry wire format, market-session classification, and the web-vitals
//! performance score.

pub mod error;
pub mod market;
pub mod model;
pub mod score;
pub mod tracing;
pub mod wire;

pub use error::{CoreError, CoreResult};
pub use market::MarketSession;
pub use model::{
    AttrMap, AttrValue, EventPriority, Journey, JourneyEvent, JourneySpan, JourneyStatus,
};
pub use score::performance_score;
pub use crate::tracing::context::{CorrelationContext, SpanId, TraceId};
pub use wire::{BrowserInfo, EventEnvelope, TelemetryBatch, TelemetryPayload};
