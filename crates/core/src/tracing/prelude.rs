//! Commonly used tracing imports

pub use crate::tracing::context::{
    BACKEND_CORRELATION_HEADER, BROWSER_SESSION_HEADER, ContextError, CorrelationContext,
    PARENT_SPAN_ID_HEADER, PORTFOLIO_ID_HEADER, SpanId, TRACE_ID_HEADER, TraceId,
};
pub use crate::tracing::metrics::{
    Counter, Gauge, Histogram, counter, gauge, histogram, log_all_metrics,
};

// Re-export common tracing macros and types
pub use tracing::{Instrument, debug, error, info, instrument, trace, warn};
