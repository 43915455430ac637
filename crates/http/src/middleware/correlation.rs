//! Browser correlation middleware
//!
//! Reads the browser correlation headers from every inbound request, opens
//! the request span carrying them so the handler's own spans attribute back
//! to the originating journey, and acknowledges recognized correlation with
//! `x-backend-trace-correlation: true` on the response.

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;

use waypoint_core::tracing::context::{BACKEND_CORRELATION_HEADER, CorrelationContext};

/// Middleware correlating requests with browser journeys
pub async fn correlation_middleware(mut request: Request, next: Next) -> Response {
    let correlation = CorrelationContext::extract(request.headers());

    let span = tracing::info_span!(
        "http_request",
        method = %request.method(),
        path = %request.uri().path(),
        otel.kind = "SERVER",
        trace_id = tracing::field::Empty,
        parent_span_id = tracing::field::Empty,
        browser_session = tracing::field::Empty,
        portfolio_id = tracing::field::Empty,
    );

    if let Some(context) = &correlation {
        span.record("trace_id", tracing::field::display(context.trace_id));
        if let Some(parent_span_id) = &context.parent_span_id {
            span.record("parent_span_id", tracing::field::display(parent_span_id));
        }
        if let Some(session_id) = &context.session_id {
            span.record("browser_session", session_id.as_str());
        }
        if let Some(portfolio_id) = &context.portfolio_id {
            span.record("portfolio_id", portfolio_id.as_str());
        }

        // Make the journey identifiers available to handlers
        request.extensions_mut().insert(context.clone());
    }

    let recognized = correlation.is_some();
    let mut response = next.run(request).instrument(span).await;

    if recognized {
        response.headers_mut().insert(
            HeaderName::from_static(BACKEND_CORRELATION_HEADER),
            HeaderValue::from_static("true"),
        );
    }

    response
}

/// Extension trait for extracting the correlation context from a request
pub trait CorrelationExt {
    /// Get the browser correlation context, when the caller sent one
    fn correlation(&self) -> Option<&CorrelationContext>;
}

impl CorrelationExt for Request {
    fn correlation(&self) -> Option<&CorrelationContext> {
        self.extensions().get::<CorrelationContext>()
    }
}
