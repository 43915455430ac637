//! Telemetry ingestion endpoint

use axum::{Json, extract::State};
use bytes::Bytes;
use opentelemetry::KeyValue;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use waypoint_core::tracing::metrics::counter;
use waypoint_core::wire::EventEnvelope;

use crate::error::HttpError;
use crate::materialize::MaterializeError;
use crate::span::with_span;
use crate::state::AppState;

/// Successful ingestion response
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct IngestResponse {
    pub status: String,
    pub processed_events: usize,
}

/// Accept a batch of browser-reported telemetry events
///
/// The body is read as raw bytes rather than through the JSON extractor
/// because the teardown path delivers via `sendBeacon`, whose content type
/// is not under our control.
#[utoipa::path(
    post,
    path = "/telemetry/browser",
    responses(
        (status = 200, description = "Batch accepted", body = IngestResponse),
        (status = 400, description = "Missing or malformed batch fields", body = crate::error::ErrorResponse),
        (status = 500, description = "Batch failed during materialization", body = crate::error::ErrorResponse)
    ),
    tag = "telemetry"
)]
pub async fn ingest_telemetry(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<IngestResponse>, HttpError> {
    let batch: Value = serde_json::from_slice(&body).map_err(|_| HttpError::InvalidTelemetry)?;

    let session_id = batch
        .get("session_id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or(HttpError::InvalidTelemetry)?
        .to_string();
    let events = batch
        .get("events")
        .and_then(Value::as_array)
        .ok_or(HttpError::InvalidTelemetry)?;

    counter("telemetry_batches_received").increment();

    let mut batch_attrs = vec![
        KeyValue::new("browser.session_id", session_id.clone()),
        KeyValue::new("batch.size", events.len() as i64),
    ];
    if let Some(info) = batch.get("browser_info") {
        if let Some(market_session) = info.get("market_session").and_then(Value::as_str) {
            batch_attrs.push(KeyValue::new(
                "browser.market_session",
                market_session.to_string(),
            ));
        }
        if let Some(url) = info.get("url").and_then(Value::as_str) {
            batch_attrs.push(KeyValue::new("browser.url", url.to_string()));
        }
    }

    // One exception boundary around the whole batch: a single bad event
    // fails the lot and nothing is partially acknowledged.
    let processed = with_span("telemetry.ingest_batch", batch_attrs, |_cx| {
        let mut processed = 0usize;
        for raw in events {
            let envelope: EventEnvelope =
                serde_json::from_value(raw.clone()).map_err(MaterializeError::from)?;
            state.materializer.materialize(&envelope, &session_id)?;
            processed += 1;
        }
        Ok::<usize, MaterializeError>(processed)
    })
    .map_err(|err| {
        tracing::error!(error = %err, session_id = %session_id, "Telemetry batch failed");
        HttpError::ProcessingFailed
    })?;

    counter("telemetry_events_processed").add(processed as u64);
    tracing::debug!(session_id = %session_id, processed, "Telemetry batch accepted");

    Ok(Json(IngestResponse {
        status: "success".to_string(),
        processed_events: processed,
    }))
}
