//! Journey data model
//!
//! A journey is a traced, named user interaction with a start and an end,
//! analogous to a distributed trace. While it is open it accumulates
//! discrete events and timed child spans; once finalized it becomes
//! immutable and is handed to the transport queue.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::tracing::context::{SpanId, TraceId};

/// A scalar attribute value
///
/// Attribute maps only carry strings and numbers; nested structures are
/// dropped at the materialization boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Str(String),
    Num(f64),
    Bool(bool),
}

impl From<&str> for AttrValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for AttrValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<f64> for AttrValue {
    fn from(value: f64) -> Self {
        Self::Num(value)
    }
}

impl From<u32> for AttrValue {
    fn from(value: u32) -> Self {
        Self::Num(f64::from(value))
    }
}

impl From<i64> for AttrValue {
    fn from(value: i64) -> Self {
        Self::Num(value as f64)
    }
}

impl From<bool> for AttrValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Attribute map attached to journeys, events and spans
pub type AttrMap = BTreeMap<String, AttrValue>;

/// Delivery priority of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventPriority {
    /// Delivered with the next batched flush
    #[serde(rename = "normal")]
    Normal,
    /// Flushed out-of-band as soon as it is enqueued
    #[serde(rename = "critical_event")]
    Critical,
}

/// Lifecycle state of a journey
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JourneyStatus {
    /// Open and accepting events/spans
    Active,
    /// Finalized by an explicit end call
    Completed,
    /// Finalized implicitly (page unload, owning UI element destroyed)
    Unmounted,
}

impl JourneyStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Unmounted => "unmounted",
        }
    }
}

/// A discrete, durationless occurrence attached to a journey
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JourneyEvent {
    pub name: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: f64,
    #[serde(default)]
    pub attributes: AttrMap,
    pub priority: EventPriority,
}

/// A timed sub-operation inside a journey, e.g. one outbound call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JourneySpan {
    pub span_id: SpanId,
    pub name: String,
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
    #[serde(default)]
    pub attributes: AttrMap,
}

impl JourneySpan {
    /// Build a child span; duration is derived, never supplied
    pub fn new(name: impl Into<String>, start_time: f64, end_time: f64, attributes: AttrMap) -> Self {
        Self {
            span_id: SpanId::generate(),
            name: name.into(),
            start_time,
            end_time,
            duration: (end_time - start_time).max(0.0),
            attributes,
        }
    }
}

/// A client-side trace of one multi-step user interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Journey {
    pub trace_id: TraceId,
    pub span_id: SpanId,
    pub name: String,
    pub start_time: f64,
    /// `None` until the journey is finalized
    pub end_time: Option<f64>,
    pub status: JourneyStatus,
    #[serde(default)]
    pub attributes: AttrMap,
    #[serde(default)]
    pub events: Vec<JourneyEvent>,
    #[serde(default)]
    pub spans: Vec<JourneySpan>,
}

impl Journey {
    /// Open a new journey with fresh identifiers
    pub fn start(name: impl Into<String>, start_time: f64, attributes: AttrMap) -> Self {
        Self {
            trace_id: TraceId::generate(),
            span_id: SpanId::generate(),
            name: name.into(),
            start_time,
            end_time: None,
            status: JourneyStatus::Active,
            attributes,
            events: Vec::new(),
            spans: Vec::new(),
        }
    }

    /// Derived duration; `None` while the journey is still open
    pub fn duration(&self) -> Option<f64> {
        self.end_time.map(|end| (end - self.start_time).max(0.0))
    }

    /// Finalize the journey, clamping the end time so it never precedes the start
    pub fn finalize(&mut self, end_time: f64, status: JourneyStatus) {
        self.end_time = Some(end_time.max(self.start_time));
        self.status = status;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duration_is_derived() {
        let mut journey = Journey::start("view_portfolio", 1_000.0, AttrMap::new());
        assert_eq!(journey.duration(), None);

        journey.finalize(1_250.0, JourneyStatus::Completed);
        assert_eq!(journey.duration(), Some(250.0));
        assert_eq!(journey.status, JourneyStatus::Completed);
    }

    #[test]
    fn test_end_time_never_precedes_start() {
        let mut journey = Journey::start("view_portfolio", 1_000.0, AttrMap::new());
        journey.finalize(900.0, JourneyStatus::Unmounted);
        assert_eq!(journey.end_time, Some(1_000.0));
        assert_eq!(journey.duration(), Some(0.0));
    }

    #[test]
    fn test_span_duration_derived() {
        let span = JourneySpan::new("api.call", 10.0, 35.5, AttrMap::new());
        assert!((span.duration - 25.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_priority_wire_names() {
        assert_eq!(
            serde_json::to_string(&EventPriority::Critical).unwrap(),
            "\"critical_event\""
        );
        assert_eq!(
            serde_json::to_string(&EventPriority::Normal).unwrap(),
            "\"normal\""
        );
    }

    #[test]
    fn test_attr_value_untagged() {
        let mut attrs = AttrMap::new();
        attrs.insert("page".to_string(), AttrValue::from("portfolio"));
        attrs.insert("count".to_string(), AttrValue::from(3.0));

        let json = serde_json::to_value(&attrs).unwrap();
        assert_eq!(json["page"], "portfolio");
        assert_eq!(json["count"], 3.0);
    }
}
