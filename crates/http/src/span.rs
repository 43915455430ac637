//! Span helper
//!
//! The single primitive everything downstream builds on: run an operation
//! inside an OpenTelemetry span, record failure, set the status, and
//! guarantee the span ends on every exit path. Export of finished spans to
//! a storage backend is whatever span processor the embedding process
//! installed globally.

use std::time::SystemTime;

use opentelemetry::global::{self, BoxedTracer};
use opentelemetry::trace::{SpanBuilder, Status, TraceContextExt, Tracer};
use opentelemetry::{Context, KeyValue};

/// Instrumentation-scope name for spans emitted by this crate
pub const TRACER_NAME: &str = "waypoint";

/// The globally registered tracer for this crate
pub fn tracer() -> BoxedTracer {
    global::tracer(TRACER_NAME)
}

/// Run `f` inside a new span
///
/// The span's status reflects the result; on `Err` the error message is
/// recorded as an exception event. The span is ended before returning, and
/// ends at drop even if `f` unwinds.
pub fn with_span<T, E, F>(
    name: impl Into<String>,
    attributes: Vec<KeyValue>,
    f: F,
) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnOnce(&Context) -> Result<T, E>,
{
    let builder = tracer().span_builder(name.into()).with_attributes(attributes);
    with_span_at(builder, None, f)
}

/// Run `f` inside a span built from `builder`, optionally closing it at an
/// explicit timestamp
///
/// Used by the materializer, which replays client-reported timings rather
/// than measuring its own.
pub fn with_span_at<T, E, F>(
    builder: SpanBuilder,
    end_time: Option<SystemTime>,
    f: F,
) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnOnce(&Context) -> Result<T, E>,
{
    let tracer = tracer();
    let span = builder.start(&tracer);
    let cx = Context::current_with_span(span);

    let result = f(&cx);

    let span = cx.span();
    match &result {
        Ok(_) => span.set_status(Status::Ok),
        Err(err) => {
            span.add_event(
                "exception",
                vec![KeyValue::new("exception.message", err.to_string())],
            );
            span.set_status(Status::error(err.to_string()));
        }
    }

    match end_time {
        Some(at) => span.end_with_timestamp(at),
        None => span.end(),
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_result_passes_through() {
        let result: Result<u32, String> =
            with_span("unit.op", vec![KeyValue::new("k", "v")], |_cx| Ok(7));
        assert_eq!(result.unwrap(), 7);
    }

    #[test]
    fn test_err_result_passes_through() {
        let result: Result<u32, String> =
            with_span("unit.op", Vec::new(), |_cx| Err("boom".to_string()));
        assert_eq!(result.unwrap_err(), "boom");
    }

    #[test]
    fn test_closure_receives_span_context() {
        let result: Result<(), String> = with_span("outer", Vec::new(), |cx| {
            assert!(cx.has_active_span());
            Ok(())
        });
        assert!(result.is_ok());
    }
}
