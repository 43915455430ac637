//! HTTP metrics middleware for request tracking

use std::time::Instant;

use axum::{extract::Request, middleware::Next, response::IntoResponse};

use waypoint_core::tracing::metrics::{counter, gauge, histogram};

/// Middleware to collect HTTP request metrics
pub async fn metrics_middleware(request: Request, next: Next) -> impl IntoResponse {
    let method = request.method().to_string();
    let start = Instant::now();

    gauge("http_requests_active").increment();
    let response = next.run(request).await;
    gauge("http_requests_active").decrement();

    let status_class = format!("{}xx", response.status().as_u16() / 100);
    counter(&format!(
        "http_requests_total_{}_{}",
        method.to_lowercase(),
        status_class
    ))
    .increment();
    counter("http_requests_total").increment();
    histogram("http_request_duration_seconds").observe_duration(start.elapsed());

    response
}
