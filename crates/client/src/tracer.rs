//! Journey recording
//!
//! The tracer owns the table of open journeys for one page/session. Every
//! operation is defensive: an unresolved trace id never raises and produces
//! no side effect, because instrumentation must never break the user flow
//! it is observing.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use waypoint_core::market;
use waypoint_core::model::{
    AttrMap, EventPriority, Journey, JourneyEvent, JourneySpan, JourneyStatus,
};
use waypoint_core::tracing::context::{SpanId, TraceId};
use waypoint_core::wire::{
    self, EventPayload, JOURNEY_STATUS_ATTR, JourneyPayload, MARKET_SESSION_ATTR, TelemetryPayload,
};

use crate::session::{Session, now_ms};
use crate::transport::TransportLayer;
use crate::vitals::{PageTimings, VitalsHandle};

/// Records journeys for one page load and hands them to the transport
///
/// One tracer per session, constructed explicitly by the embedding
/// application; distinct journeys never interfere with each other.
pub struct JourneyTracer {
    session: Session,
    page_timings: Option<PageTimings>,
    vitals: VitalsHandle,
    active: Mutex<HashMap<TraceId, Journey>>,
    current: Mutex<Option<TraceId>>,
    transport: Arc<TransportLayer>,
}

impl JourneyTracer {
    pub fn new(session: Session, transport: Arc<TransportLayer>) -> Self {
        Self {
            session,
            page_timings: None,
            vitals: VitalsHandle::new(),
            active: Mutex::new(HashMap::new()),
            current: Mutex::new(None),
            transport,
        }
    }

    /// Attach the page-load timing snapshot stamped onto every journey
    pub fn with_page_timings(mut self, timings: PageTimings) -> Self {
        self.page_timings = Some(timings);
        self
    }

    /// The session this tracer belongs to
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Handle for passive observers to feed web-vitals observations
    pub fn vitals(&self) -> VitalsHandle {
        self.vitals.clone()
    }

    /// Number of currently open journeys
    pub fn active_count(&self) -> usize {
        self.active.lock().map(|active| active.len()).unwrap_or(0)
    }

    /// The most recently started journey that is still open
    pub fn current_journey(&self) -> Option<(TraceId, SpanId)> {
        let current = (*self.current.lock().ok()?)?;
        let active = self.active.lock().ok()?;
        active
            .get(&current)
            .map(|journey| (journey.trace_id, journey.span_id))
    }

    /// Open a journey for a named user interaction
    ///
    /// Stamps page-load timings and the current market-session phase before
    /// merging the caller's attributes. Returns `None` (and records
    /// nothing) when `name` is empty.
    pub fn start_journey(&self, name: &str, attrs: AttrMap) -> Option<TraceId> {
        if name.is_empty() {
            tracing::warn!("Ignoring journey start with empty name");
            return None;
        }

        let mut journey = Journey::start(name, now_ms(), AttrMap::new());
        if let Some(timings) = &self.page_timings {
            timings.apply_to(&mut journey.attributes);
        }
        journey.attributes.insert(
            MARKET_SESSION_ATTR.to_string(),
            market::classify_now().as_str().into(),
        );
        journey.attributes.extend(attrs);

        let trace_id = journey.trace_id;
        if let Ok(mut active) = self.active.lock() {
            active.insert(trace_id, journey);
        }
        if let Ok(mut current) = self.current.lock() {
            *current = Some(trace_id);
        }

        tracing::debug!(%trace_id, journey = name, "Journey started");
        Some(trace_id)
    }

    /// Append an event to an open journey
    ///
    /// Events on the critical allow-list are additionally enqueued
    /// standalone and flushed out-of-band instead of waiting for the next
    /// batch trigger.
    pub fn add_journey_event(&self, trace_id: TraceId, name: &str, attrs: AttrMap) {
        let critical = wire::is_critical_event(name);
        let priority = if critical {
            EventPriority::Critical
        } else {
            EventPriority::Normal
        };
        let timestamp = now_ms();

        {
            let Ok(mut active) = self.active.lock() else {
                return;
            };
            let Some(journey) = active.get_mut(&trace_id) else {
                tracing::debug!(%trace_id, event = name, "Ignoring event for unknown journey");
                return;
            };
            journey.events.push(JourneyEvent {
                name: name.to_string(),
                timestamp,
                attributes: attrs.clone(),
                priority,
            });
        }

        if critical {
            let payload = TelemetryPayload::Event(EventPayload {
                name: name.to_string(),
                trace_id: Some(trace_id),
                timestamp,
                attributes: wire::to_json_map(&attrs),
            });
            self.transport.enqueue(payload, EventPriority::Critical);
        }
    }

    /// Append a timed child span to an open journey
    pub fn add_journey_span(
        &self,
        trace_id: TraceId,
        name: &str,
        start_time: f64,
        end_time: f64,
        attrs: AttrMap,
    ) {
        let Ok(mut active) = self.active.lock() else {
            return;
        };
        let Some(journey) = active.get_mut(&trace_id) else {
            tracing::debug!(%trace_id, span = name, "Ignoring span for unknown journey");
            return;
        };
        journey
            .spans
            .push(JourneySpan::new(name, start_time, end_time, attrs));
    }

    /// Explicitly finalize a journey as completed
    ///
    /// Idempotent: a second call for the same id no longer resolves and is
    /// a no-op.
    pub fn end_journey(&self, trace_id: TraceId, attrs: AttrMap) {
        self.finalize(trace_id, attrs, JourneyStatus::Completed);
    }

    /// Implicitly finalize a journey whose owning UI element went away
    pub fn unmount_journey(&self, trace_id: TraceId) {
        self.finalize(trace_id, AttrMap::new(), JourneyStatus::Unmounted);
    }

    /// Page-teardown path: finalize everything still open and hand the
    /// queue to the guaranteed-attempt transmission primitive
    pub fn teardown(&self) {
        let open: Vec<TraceId> = self
            .active
            .lock()
            .map(|active| active.keys().copied().collect())
            .unwrap_or_default();
        for trace_id in open {
            self.finalize(trace_id, AttrMap::new(), JourneyStatus::Unmounted);
        }

        if let Err(err) = self.transport.flush_teardown() {
            tracing::warn!(error = %err, "Teardown telemetry flush failed");
        }
    }

    fn finalize(&self, trace_id: TraceId, attrs: AttrMap, status: JourneyStatus) {
        let journey = self
            .active
            .lock()
            .ok()
            .and_then(|mut active| active.remove(&trace_id));
        let Some(mut journey) = journey else {
            tracing::debug!(%trace_id, "Ignoring end for unknown journey");
            return;
        };

        journey.attributes.extend(attrs);

        let (vitals, memory) = self.vitals.snapshot();
        vitals.apply_to(&mut journey.attributes);
        if let Some(memory) = memory {
            memory.apply_to(&mut journey.attributes);
        }
        journey
            .attributes
            .insert(JOURNEY_STATUS_ATTR.to_string(), status.as_str().into());

        journey.finalize(now_ms(), status);

        if let Ok(mut current) = self.current.lock() {
            if *current == Some(trace_id) {
                *current = None;
            }
        }

        tracing::debug!(%trace_id, journey = %journey.name, status = status.as_str(), "Journey ended");
        let payload = TelemetryPayload::Journey(JourneyPayload::from(&journey));
        self.transport.enqueue(payload, EventPriority::Normal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use waypoint_core::score::LCP_ATTR;
    use waypoint_core::wire::TelemetryBatch;

    use crate::transport::{TelemetrySink, TransportConfig, TransportError};

    #[derive(Default)]
    struct TestSink {
        batches: Mutex<Vec<TelemetryBatch>>,
        final_count: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl TelemetrySink for TestSink {
        async fn deliver(&self, batch: &TelemetryBatch) -> Result<(), TransportError> {
            self.batches.lock().unwrap().push(batch.clone());
            Ok(())
        }

        fn deliver_final(&self, batch: &TelemetryBatch) -> Result<(), TransportError> {
            self.final_count.fetch_add(1, Ordering::SeqCst);
            self.batches.lock().unwrap().push(batch.clone());
            Ok(())
        }
    }

    fn tracer() -> (Arc<JourneyTracer>, Arc<TestSink>) {
        let sink = Arc::new(TestSink::default());
        let session = Session::new("test-agent", "https://dashboard.test/", "");
        let transport = Arc::new(TransportLayer::new(
            TransportConfig::default(),
            session.clone(),
            sink.clone(),
        ));
        (Arc::new(JourneyTracer::new(session, transport)), sink)
    }

    fn delivered_journeys(sink: &TestSink) -> Vec<JourneyPayload> {
        sink.batches
            .lock()
            .unwrap()
            .iter()
            .flat_map(|batch| batch.events.iter())
            .filter_map(|envelope| match &envelope.data {
                TelemetryPayload::Journey(journey) => Some(journey.clone()),
                TelemetryPayload::Event(_) => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_start_then_end_yields_completed_empty_journey() {
        let (tracer, sink) = tracer();

        let trace_id = tracer.start_journey("view_portfolio", AttrMap::new()).unwrap();
        tracer.end_journey(trace_id, AttrMap::new());
        assert_eq!(tracer.active_count(), 0);

        tracer.teardown();
        let journeys = delivered_journeys(&sink);
        assert_eq!(journeys.len(), 1);

        let journey = &journeys[0];
        assert_eq!(journey.journey_name, "view_portfolio");
        assert!(journey.events.is_empty());
        assert!(journey.spans.is_empty());
        assert!(journey.end_time >= journey.start_time);
        assert_eq!(
            journey.attributes.get(JOURNEY_STATUS_ATTR).and_then(|v| v.as_str()),
            Some("completed")
        );
        assert!(journey.attributes.contains_key(MARKET_SESSION_ATTR));
    }

    #[tokio::test]
    async fn test_empty_name_is_rejected() {
        let (tracer, _) = tracer();
        assert!(tracer.start_journey("", AttrMap::new()).is_none());
        assert_eq!(tracer.active_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_trace_id_is_ignored() {
        let (tracer, sink) = tracer();
        let ghost = TraceId::generate();

        tracer.add_journey_event(ghost, "click", AttrMap::new());
        tracer.add_journey_span(ghost, "api", 0.0, 1.0, AttrMap::new());
        tracer.end_journey(ghost, AttrMap::new());

        assert_eq!(tracer.active_count(), 0);
        tracer.teardown();
        assert!(delivered_journeys(&sink).is_empty());
    }

    #[tokio::test]
    async fn test_end_journey_is_idempotent() {
        let (tracer, sink) = tracer();
        let trace_id = tracer.start_journey("view_orders", AttrMap::new()).unwrap();

        tracer.end_journey(trace_id, AttrMap::new());
        tracer.end_journey(trace_id, AttrMap::new());

        tracer.teardown();
        assert_eq!(delivered_journeys(&sink).len(), 1);
    }

    #[tokio::test]
    async fn test_critical_event_enqueued_out_of_band() {
        let (tracer, _) = tracer();
        let trace_id = tracer.start_journey("place_order", AttrMap::new()).unwrap();

        tracer.add_journey_event(trace_id, "order_rejected", AttrMap::new());

        // The standalone critical copy sits in the queue before any timer fires
        assert_eq!(tracer.transport.queue_len(), 1);
    }

    #[tokio::test]
    async fn test_events_and_spans_recorded_on_open_journey() {
        let (tracer, sink) = tracer();
        let trace_id = tracer.start_journey("rebalance", AttrMap::new()).unwrap();

        let mut attrs = AttrMap::new();
        attrs.insert("step".to_string(), "confirm".into());
        tracer.add_journey_event(trace_id, "step_completed", attrs);
        tracer.add_journey_span(trace_id, "api /positions", 100.0, 180.0, AttrMap::new());

        tracer.end_journey(trace_id, AttrMap::new());
        tracer.teardown();

        let journeys = delivered_journeys(&sink);
        assert_eq!(journeys[0].events.len(), 1);
        assert_eq!(journeys[0].spans.len(), 1);
        assert_eq!(journeys[0].spans[0].duration, 80.0);
    }

    #[tokio::test]
    async fn test_vitals_attached_at_end() {
        let (tracer, sink) = tracer();
        tracer.vitals().record_lcp(1800.0);

        let trace_id = tracer.start_journey("view_portfolio", AttrMap::new()).unwrap();
        tracer.end_journey(trace_id, AttrMap::new());
        tracer.teardown();

        let journeys = delivered_journeys(&sink);
        assert_eq!(
            journeys[0].attributes.get(LCP_ATTR).and_then(|v| v.as_f64()),
            Some(1800.0)
        );
    }

    #[tokio::test]
    async fn test_current_journey_tracks_latest_open() {
        let (tracer, _) = tracer();
        assert!(tracer.current_journey().is_none());

        let first = tracer.start_journey("first", AttrMap::new()).unwrap();
        let second = tracer.start_journey("second", AttrMap::new()).unwrap();
        assert_eq!(tracer.current_journey().unwrap().0, second);

        tracer.end_journey(second, AttrMap::new());
        assert!(tracer.current_journey().is_none());
        // The older journey is still open, just not current
        assert_eq!(tracer.active_count(), 1);
        tracer.end_journey(first, AttrMap::new());
    }

    #[tokio::test]
    async fn test_teardown_unmounts_open_journeys() {
        let (tracer, sink) = tracer();
        tracer.start_journey("abandoned", AttrMap::new());

        tracer.teardown();
        assert_eq!(tracer.active_count(), 0);
        assert_eq!(sink.final_count.load(Ordering::SeqCst), 1);

        let journeys = delivered_journeys(&sink);
        assert_eq!(
            journeys[0].attributes.get(JOURNEY_STATUS_ATTR).and_then(|v| v.as_str()),
            Some("unmounted")
        );
    }
}
