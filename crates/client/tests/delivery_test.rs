//! End-to-end delivery tests against a mock ingestion endpoint

use std::sync::Arc;

use serde_json::{Value, json};
use wiremock::matchers::{header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use waypoint_client::{
    DashboardApi, JourneyTracer, Session, TransportConfig, TransportLayer, transport::HttpSink,
};
use waypoint_core::model::AttrMap;
use waypoint_core::wire::TELEMETRY_PATH;

async fn pipeline(server: &MockServer) -> (Arc<JourneyTracer>, Arc<TransportLayer>) {
    let session = Session::new("test-agent", "https://dashboard.test/portfolio", "");
    let sink = Arc::new(HttpSink::new(format!("{}{}", server.uri(), TELEMETRY_PATH)));
    let transport = Arc::new(TransportLayer::new(
        TransportConfig::default(),
        session.clone(),
        sink,
    ));
    (
        Arc::new(JourneyTracer::new(session, transport.clone())),
        transport,
    )
}

#[tokio::test]
async fn test_journey_batch_is_delivered() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TELEMETRY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "processed_events": 1
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (tracer, transport) = pipeline(&server).await;

    let trace_id = tracer.start_journey("view_portfolio", AttrMap::new()).unwrap();
    tracer.end_journey(trace_id, AttrMap::new());
    assert_eq!(transport.flush().await.unwrap(), 1);

    let requests = server.received_requests().await.unwrap();
    let body: Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert!(body["session_id"].is_string());
    assert_eq!(body["events"][0]["data"]["journey_name"], "view_portfolio");
    assert_eq!(body["events"][0]["priority"], "normal");
    assert!(body["browser_info"]["market_session"].is_string());
}

#[tokio::test]
async fn test_rejected_batch_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TELEMETRY_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "Invalid telemetry data"
        })))
        .mount(&server)
        .await;

    let (tracer, transport) = pipeline(&server).await;

    let trace_id = tracer.start_journey("view_orders", AttrMap::new()).unwrap();
    tracer.end_journey(trace_id, AttrMap::new());

    // The server answered; validation failures are terminal client-side
    assert!(transport.flush().await.is_err());
    assert_eq!(transport.queue_len(), 0);
}

#[tokio::test]
async fn test_unreachable_endpoint_requeues_batch() {
    let server = MockServer::start().await;
    let endpoint = format!("{}{}", server.uri(), TELEMETRY_PATH);
    // Shut the server down so the connection is refused
    drop(server);

    let session = Session::new("test-agent", "https://dashboard.test/portfolio", "");
    let sink = Arc::new(HttpSink::new(endpoint));
    let transport = Arc::new(TransportLayer::new(
        TransportConfig::default(),
        session.clone(),
        sink,
    ));
    let tracer = Arc::new(JourneyTracer::new(session, transport.clone()));

    let trace_id = tracer.start_journey("view_orders", AttrMap::new()).unwrap();
    tracer.end_journey(trace_id, AttrMap::new());

    assert!(transport.flush().await.is_err());
    assert_eq!(transport.queue_len(), 1);
}

#[tokio::test]
async fn test_api_call_carries_correlation_headers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/positions"))
        .and(header_exists("x-trace-id"))
        .and(header_exists("x-parent-span-id"))
        .and(header_exists("x-browser-session"))
        .and(header_exists("x-portfolio-id"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"positions": []})))
        .expect(1)
        .mount(&server)
        .await;

    let (tracer, _) = pipeline(&server).await;
    let api = DashboardApi::new(server.uri(), tracer.clone()).unwrap();
    api.set_portfolio(Some("pf-42".to_string()));

    let trace_id = tracer.start_journey("view_positions", AttrMap::new()).unwrap();
    let _: Value = api.get("/api/positions").await.unwrap();
    tracer.end_journey(trace_id, AttrMap::new());

    server.verify().await;

    let requests = server.received_requests().await.unwrap();
    let sent_trace = requests[0].headers.get("x-trace-id").unwrap();
    assert_eq!(sent_trace.to_str().unwrap(), trace_id.to_string());
}

#[tokio::test]
async fn test_api_call_recorded_as_child_span() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/positions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"positions": []})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(TELEMETRY_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "success",
            "processed_events": 1
        })))
        .mount(&server)
        .await;

    let (tracer, transport) = pipeline(&server).await;
    let api = DashboardApi::new(server.uri(), tracer.clone()).unwrap();

    let trace_id = tracer.start_journey("view_positions", AttrMap::new()).unwrap();
    let _: Value = api.get("/api/positions").await.unwrap();
    assert!(api.get::<Value>("/api/broken").await.is_err());
    tracer.end_journey(trace_id, AttrMap::new());
    transport.flush().await.unwrap();

    let requests = server.received_requests().await.unwrap();
    let telemetry = requests
        .iter()
        .find(|request| request.url.path() == TELEMETRY_PATH)
        .unwrap();
    let body: Value = serde_json::from_slice(&telemetry.body).unwrap();
    let spans = body["events"][0]["data"]["spans"].as_array().unwrap();
    assert_eq!(spans.len(), 2);

    assert_eq!(spans[0]["attributes"]["span.type"], "http_request");
    assert_eq!(spans[0]["attributes"]["success"], true);
    assert_eq!(spans[0]["attributes"]["http.status_code"], 200.0);
    assert!(spans[0]["duration"].as_f64().unwrap() >= 0.0);

    assert_eq!(spans[1]["attributes"]["success"], false);
    assert_eq!(spans[1]["attributes"]["http.status_code"], 500.0);
}
