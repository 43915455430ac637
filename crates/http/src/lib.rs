//! Waypoint HTTP ingestion service
//!
//! Accepts batches of browser-reported telemetry, materializes each
//! accepted event into a backend span, and correlates inbound business
//! requests with the originating browser journey via shared identifiers.

pub mod error;
pub mod materialize;
pub mod middleware;
pub mod routes;
pub mod span;
pub mod state;

pub use error::{ErrorResponse, HttpError, Result};
pub use materialize::{MaterializeError, MaterializedSpan, SpanMaterializer};
pub use state::AppState;
