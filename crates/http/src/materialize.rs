//! Span materialization
//!
//! Converts each accepted client event into a backend span. Payload shape
//! was already discriminated at the decode boundary; here journeys become
//! `browser.journey.<name>` spans (with their nested events and child spans
//! replayed verbatim) and standalone events become `browser.event.<name>`
//! spans. Client-reported timestamps and durations are trusted, not
//! re-derived.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use opentelemetry::trace::{Span, TraceContextExt, Tracer};
use opentelemetry::{KeyValue, trace as otel};
use serde_json::Value;
use thiserror::Error;

use waypoint_core::score::{CLS_ATTR, FID_ATTR, LCP_ATTR, SCORE_ATTR, performance_score};
use waypoint_core::wire::{
    EventEnvelope, EventPayload, JOURNEY_STATUS_ATTR, JourneyPayload, JsonMap, TelemetryPayload,
};

use crate::span::{self, with_span_at};

/// Errors raised while materializing a batch
#[derive(Error, Debug)]
pub enum MaterializeError {
    #[error("Invalid timestamp {0}")]
    InvalidTimestamp(f64),

    #[error("Malformed event payload: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Summary of one materialized span
///
/// The span itself goes to the globally installed processor; the summary is
/// what the ingestion handler (and tests) observe.
#[derive(Debug, Clone)]
pub struct MaterializedSpan {
    pub name: String,
    pub attributes: Vec<KeyValue>,
    pub sub_events: usize,
    pub child_spans: usize,
    pub performance_score: Option<f64>,
}

/// Converts accepted client events into backend spans
#[derive(Debug, Default)]
pub struct SpanMaterializer;

impl SpanMaterializer {
    pub fn new() -> Self {
        Self
    }

    /// Materialize one envelope into a backend span
    pub fn materialize(
        &self,
        envelope: &EventEnvelope,
        session_id: &str,
    ) -> Result<MaterializedSpan, MaterializeError> {
        match &envelope.data {
            TelemetryPayload::Journey(journey) => self.materialize_journey(journey, session_id),
            TelemetryPayload::Event(event) => {
                self.materialize_event(event, envelope.timestamp, session_id)
            }
        }
    }

    fn materialize_journey(
        &self,
        journey: &JourneyPayload,
        session_id: &str,
    ) -> Result<MaterializedSpan, MaterializeError> {
        let name = format!("browser.journey.{}", journey.journey_name);

        let mut attributes = flatten_attributes(&journey.attributes);
        attributes.push(KeyValue::new("browser.session_id", session_id.to_string()));
        attributes.push(KeyValue::new("browser.duration_ms", journey.duration));
        if let Some(trace_id) = journey.trace_id {
            attributes.push(KeyValue::new("browser.trace_id", trace_id.to_string()));
        }

        let score = self.score_for(journey);
        if let Some(score) = score {
            attributes.push(KeyValue::new(SCORE_ATTR, score));
        }

        let start = system_time(journey.start_time)?;
        let end = system_time(journey.end_time.max(journey.start_time))?;

        let mut builder = span::tracer()
            .span_builder(name.clone())
            .with_start_time(start)
            .with_attributes(attributes.clone());
        // Adopt the client-generated identifiers so backend request spans
        // carrying the same trace id land in the same trace
        if let Some(trace_id) = journey.trace_id {
            builder = builder.with_trace_id(otel::TraceId::from_bytes(*trace_id.as_bytes()));
        }
        if let Some(span_id) = journey.span_id {
            builder = builder.with_span_id(otel::SpanId::from_bytes(*span_id.as_bytes()));
        }

        with_span_at(builder, Some(end), |cx| {
            let span = cx.span();
            for event in &journey.events {
                span.add_event_with_timestamp(
                    event.name.clone(),
                    system_time(event.timestamp)?,
                    flatten_attributes(&event.attributes),
                );
            }

            let tracer = span::tracer();
            for child in &journey.spans {
                let child_start = system_time(child.start_time)?;
                let child_end = system_time(child.end_time.max(child.start_time))?;
                let mut child_attributes = flatten_attributes(&child.attributes);
                child_attributes.push(KeyValue::new("browser.duration_ms", child.duration));

                let mut child_span = tracer
                    .span_builder(child.name.clone())
                    .with_start_time(child_start)
                    .with_attributes(child_attributes)
                    .start_with_context(&tracer, cx);
                child_span.end_with_timestamp(child_end);
            }
            Ok(())
        })?;

        tracing::debug!(span = %name, events = journey.events.len(), spans = journey.spans.len(), "Materialized browser journey");
        Ok(MaterializedSpan {
            name,
            attributes,
            sub_events: journey.events.len(),
            child_spans: journey.spans.len(),
            performance_score: score,
        })
    }

    fn materialize_event(
        &self,
        event: &EventPayload,
        enqueued_at: f64,
        session_id: &str,
    ) -> Result<MaterializedSpan, MaterializeError> {
        let name = format!("browser.event.{}", event.name);

        let mut attributes = flatten_attributes(&event.attributes);
        attributes.push(KeyValue::new("browser.session_id", session_id.to_string()));
        if let Some(trace_id) = event.trace_id {
            attributes.push(KeyValue::new("browser.trace_id", trace_id.to_string()));
        }

        let at = system_time(if event.timestamp > 0.0 {
            event.timestamp
        } else {
            enqueued_at
        })?;

        let mut builder = span::tracer()
            .span_builder(name.clone())
            .with_start_time(at)
            .with_attributes(attributes.clone());
        if let Some(trace_id) = event.trace_id {
            builder = builder.with_trace_id(otel::TraceId::from_bytes(*trace_id.as_bytes()));
        }

        with_span_at(builder, Some(at), |_cx| Ok::<(), MaterializeError>(()))?;

        tracing::debug!(span = %name, "Materialized browser event");
        Ok(MaterializedSpan {
            name,
            attributes,
            sub_events: 0,
            child_spans: 0,
            performance_score: None,
        })
    }

    // Completed journeys get a score; anything else ships without one.
    fn score_for(&self, journey: &JourneyPayload) -> Option<f64> {
        let status = journey
            .attributes
            .get(JOURNEY_STATUS_ATTR)
            .and_then(Value::as_str)?;
        if status != "completed" {
            return None;
        }

        let vital = |key: &str| {
            journey
                .attributes
                .get(key)
                .and_then(Value::as_f64)
                .unwrap_or(0.0)
        };
        Some(performance_score(vital(LCP_ATTR), vital(FID_ATTR), vital(CLS_ATTR)))
    }
}

/// Keep scalar values only, namespaced under `browser.*`; nested objects
/// and arrays are dropped rather than serialized
fn flatten_attributes(map: &JsonMap) -> Vec<KeyValue> {
    map.iter()
        .filter_map(|(key, value)| {
            let key = format!("browser.{key}");
            match value {
                Value::String(s) => Some(KeyValue::new(key, s.clone())),
                Value::Number(n) => n.as_f64().map(|n| KeyValue::new(key, n)),
                Value::Bool(b) => Some(KeyValue::new(key, *b)),
                _ => None,
            }
        })
        .collect()
}

fn system_time(ms: f64) -> Result<SystemTime, MaterializeError> {
    if !ms.is_finite() || ms < 0.0 {
        return Err(MaterializeError::InvalidTimestamp(ms));
    }
    Ok(UNIX_EPOCH + Duration::from_secs_f64(ms / 1000.0))
}
