//! Waypoint browser instrumentation
//!
//! Records multi-step user interactions as journeys, batches them for
//! reliable delivery to the ingestion endpoint (including during page
//! teardown), and stamps correlation identifiers onto outbound business
//! API calls so backend request spans can be attributed to the originating
//! journey.
//!
//! The pieces compose explicitly, one set per page load:
//!
//! ```ignore
//! let session = Session::from_window();
//! let sink = Arc::new(HttpSink::new("https://host/telemetry/browser"));
//! let transport = Arc::new(TransportLayer::new(TransportConfig::default(), session.clone(), sink));
//! let tracer = Arc::new(JourneyTracer::new(session, transport.clone()));
//! TransportLayer::start_interval(&transport);
//! ```

pub mod api;
#[cfg(target_arch = "wasm32")]
pub mod browser;
pub mod session;
pub mod tracer;
pub mod transport;
pub mod vitals;

pub use api::{ApiError, DashboardApi};
pub use session::Session;
pub use tracer::JourneyTracer;
pub use transport::{
    HttpSink, TelemetrySink, TransportConfig, TransportError, TransportLayer,
};
pub use vitals::{MemoryInfo, PageTimings, VitalsHandle, WebVitals};
