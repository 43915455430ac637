//! Telemetry wire format
//!
//! The shapes exchanged on `POST /telemetry/browser`. Payloads are
//! shape-discriminated: an object carrying `journey_name` is a journey,
//! one carrying only `name` is a standalone event. The discrimination is
//! resolved here, at the decode boundary, into [`TelemetryPayload`] so no
//! downstream logic branches on field presence.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::market::MarketSession;
use crate::model::{AttrMap, AttrValue, EventPriority, Journey, JourneyEvent, JourneySpan};
use crate::tracing::context::{SpanId, TraceId};

/// Ingestion endpoint path
pub const TELEMETRY_PATH: &str = "/telemetry/browser";

/// Attribute key carrying the journey's final status
pub const JOURNEY_STATUS_ATTR: &str = "journey.status";
/// Attribute key carrying the market-session phase a journey started in
pub const MARKET_SESSION_ATTR: &str = "market.session";
/// Attribute key classifying a child span
pub const SPAN_TYPE_ATTR: &str = "span.type";

/// Event names that bypass batching and flush immediately
pub const CRITICAL_EVENT_NAMES: &[&str] = &[
    "error",
    "api_error",
    "order_rejected",
    "trade_failed",
    "session_expired",
];

/// Whether an event name is on the critical allow-list
pub fn is_critical_event(name: &str) -> bool {
    CRITICAL_EVENT_NAMES.contains(&name)
}

/// JSON attribute map as received on the wire
///
/// Unlike [`AttrMap`] this may still contain nested values; the
/// materializer drops non-scalars when flattening.
pub type JsonMap = Map<String, Value>;

/// One element of a telemetry batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub data: TelemetryPayload,
    pub priority: EventPriority,
    /// Enqueue time, milliseconds since the Unix epoch
    pub timestamp: f64,
}

/// Shape-discriminated telemetry payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TelemetryPayload {
    Journey(JourneyPayload),
    Event(EventPayload),
}

/// A finalized journey as shipped to the backend
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JourneyPayload {
    pub journey_name: String,
    #[serde(default)]
    pub trace_id: Option<TraceId>,
    #[serde(default)]
    pub span_id: Option<SpanId>,
    #[serde(default)]
    pub start_time: f64,
    #[serde(default)]
    pub end_time: f64,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub attributes: JsonMap,
    #[serde(default)]
    pub events: Vec<SubEvent>,
    #[serde(default)]
    pub spans: Vec<SubSpan>,
}

/// A standalone (critical) event shipped outside a journey payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventPayload {
    pub name: String,
    #[serde(default)]
    pub trace_id: Option<TraceId>,
    #[serde(default)]
    pub timestamp: f64,
    #[serde(default)]
    pub attributes: JsonMap,
}

/// A journey's nested event, replayed verbatim server-side
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubEvent {
    pub name: String,
    #[serde(default)]
    pub timestamp: f64,
    #[serde(default)]
    pub attributes: JsonMap,
}

/// A journey's child span, replayed verbatim server-side
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubSpan {
    pub name: String,
    #[serde(default)]
    pub span_id: Option<SpanId>,
    #[serde(default)]
    pub start_time: f64,
    #[serde(default)]
    pub end_time: f64,
    #[serde(default)]
    pub duration: f64,
    #[serde(default)]
    pub attributes: JsonMap,
}

/// Session/browser metadata shipped with every batch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserInfo {
    pub user_agent: String,
    pub url: String,
    pub market_session: MarketSession,
    /// Batch assembly time, milliseconds since the Unix epoch
    pub timestamp: f64,
}

/// One delivery to the ingestion endpoint
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryBatch {
    pub session_id: String,
    pub events: Vec<EventEnvelope>,
    #[serde(default)]
    pub browser_info: Option<BrowserInfo>,
}

/// Convert a scalar attribute map to its wire representation
pub fn to_json_map(attrs: &AttrMap) -> JsonMap {
    attrs
        .iter()
        .map(|(key, value)| {
            let json = match value {
                AttrValue::Str(s) => Value::String(s.clone()),
                AttrValue::Num(n) => Value::from(*n),
                AttrValue::Bool(b) => Value::Bool(*b),
            };
            (key.clone(), json)
        })
        .collect()
}

impl From<&JourneyEvent> for SubEvent {
    fn from(event: &JourneyEvent) -> Self {
        Self {
            name: event.name.clone(),
            timestamp: event.timestamp,
            attributes: to_json_map(&event.attributes),
        }
    }
}

impl From<&JourneySpan> for SubSpan {
    fn from(span: &JourneySpan) -> Self {
        Self {
            name: span.name.clone(),
            span_id: Some(span.span_id),
            start_time: span.start_time,
            end_time: span.end_time,
            duration: span.duration,
            attributes: to_json_map(&span.attributes),
        }
    }
}

impl From<&Journey> for JourneyPayload {
    fn from(journey: &Journey) -> Self {
        let end_time = journey.end_time.unwrap_or(journey.start_time);
        Self {
            journey_name: journey.name.clone(),
            trace_id: Some(journey.trace_id),
            span_id: Some(journey.span_id),
            start_time: journey.start_time,
            end_time,
            duration: journey.duration().unwrap_or(0.0),
            attributes: to_json_map(&journey.attributes),
            events: journey.events.iter().map(SubEvent::from).collect(),
            spans: journey.spans.iter().map(SubSpan::from).collect(),
        }
    }
}
