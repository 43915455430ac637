//! Application state management

use std::sync::Arc;

use crate::materialize::SpanMaterializer;

/// Shared application state
///
/// Held by all handlers and middleware. Ingestion is stateless per request;
/// the only shared piece is the materializer.
#[derive(Clone, Default)]
pub struct AppState {
    /// Converts accepted client events into backend spans
    pub materializer: Arc<SpanMaterializer>,
}

impl AppState {
    /// Create a new AppState
    pub fn new() -> Self {
        Self::default()
    }
}
