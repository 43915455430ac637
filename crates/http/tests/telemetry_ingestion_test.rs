//! Integration tests for the ingestion endpoint and journey correlation

use axum::Router;
use axum::body::Body;
use http::{Request, StatusCode};
use serde_json::{Value, json};
use tower::ServiceExt;

use waypoint_http::middleware::correlation_middleware;
use waypoint_http::{AppState, routes};

fn test_app() -> Router {
    routes::router(AppState::new()).layer(axum::middleware::from_fn(correlation_middleware))
}

fn telemetry_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/telemetry/browser")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn response_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_journey_batch_accepted() {
    let response = test_app()
        .oneshot(telemetry_request(json!({
            "session_id": "session-1",
            "events": [{
                "data": {
                    "journey_name": "view_portfolio",
                    "start_time": 1_700_000_000_000.0_f64,
                    "end_time": 1_700_000_001_000.0_f64,
                    "duration": 1000.0,
                    "attributes": {
                        "journey.status": "completed",
                        "vitals.lcp": 2000.0,
                        "vitals.fid": 80.0,
                        "vitals.cls": 0.05
                    }
                },
                "priority": "normal",
                "timestamp": 1_700_000_001_000.0_f64
            }],
            "browser_info": {
                "user_agent": "test-agent",
                "url": "https://dashboard.test/portfolio",
                "market_session": "market_hours",
                "timestamp": 1_700_000_001_000.0_f64
            }
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["status"], "success");
    assert_eq!(body["processed_events"], 1);
}

#[tokio::test]
async fn test_mixed_batch_counts_all_events() {
    let response = test_app()
        .oneshot(telemetry_request(json!({
            "session_id": "session-1",
            "events": [
                {
                    "data": {"journey_name": "view_orders"},
                    "priority": "normal",
                    "timestamp": 1_700_000_000_000.0_f64
                },
                {
                    "data": {"name": "order_rejected"},
                    "priority": "critical_event",
                    "timestamp": 1_700_000_000_100.0_f64
                }
            ]
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["processed_events"], 2);
}

#[tokio::test]
async fn test_missing_session_id_rejected() {
    let response = test_app()
        .oneshot(telemetry_request(json!({
            "events": []
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Invalid telemetry data");
}

#[tokio::test]
async fn test_events_must_be_an_array() {
    let response = test_app()
        .oneshot(telemetry_request(json!({
            "session_id": "session-1",
            "events": "not-an-array"
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Invalid telemetry data");
}

#[tokio::test]
async fn test_unparseable_body_rejected() {
    let request = Request::builder()
        .method("POST")
        .uri("/telemetry/browser")
        .body(Body::from("not json"))
        .unwrap();

    let response = test_app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_malformed_event_fails_whole_batch() {
    let response = test_app()
        .oneshot(telemetry_request(json!({
            "session_id": "session-1",
            "events": [
                {
                    "data": {"journey_name": "view_portfolio"},
                    "priority": "normal",
                    "timestamp": 1_700_000_000_000.0_f64
                },
                {
                    "data": {"neither_journey_nor_event": true},
                    "priority": "normal",
                    "timestamp": 1_700_000_000_100.0_f64
                }
            ]
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body = response_json(response).await;
    assert_eq!(body["error"], "Failed to process telemetry data");
}

#[tokio::test]
async fn test_beacon_content_type_is_accepted() {
    // sendBeacon payloads may arrive as text/plain
    let request = Request::builder()
        .method("POST")
        .uri("/telemetry/browser")
        .header("content-type", "text/plain;charset=UTF-8")
        .body(Body::from(
            json!({
                "session_id": "session-1",
                "events": []
            })
            .to_string(),
        ))
        .unwrap();

    let response = test_app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["processed_events"], 0);
}

#[tokio::test]
async fn test_correlated_request_is_acknowledged() {
    let request = Request::builder()
        .uri("/health")
        .header("x-trace-id", "4bf92f3577b34da6a3ce929d0e0e4736")
        .header("x-parent-span-id", "00f067aa0ba902b7")
        .header("x-browser-session", "session-1")
        .body(Body::empty())
        .unwrap();

    let response = test_app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response
            .headers()
            .get("x-backend-trace-correlation")
            .and_then(|value| value.to_str().ok()),
        Some("true")
    );
}

#[tokio::test]
async fn test_uncorrelated_request_is_not_acknowledged() {
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

    let response = test_app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .get("x-backend-trace-correlation")
            .is_none()
    );
}

#[tokio::test]
async fn test_invalid_trace_id_header_is_ignored() {
    let request = Request::builder()
        .uri("/health")
        .header("x-trace-id", "not-a-trace-id")
        .body(Body::empty())
        .unwrap();

    let response = test_app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(
        response
            .headers()
            .get("x-backend-trace-correlation")
            .is_none()
    );
}
