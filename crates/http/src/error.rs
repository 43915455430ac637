//! HTTP error types and implementations

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// HTTP-specific errors
///
/// The wire bodies are part of the ingestion contract and must not change
/// shape: validation failures answer 400, anything that fails while
/// materializing a batch answers 500.
#[derive(Error, Debug)]
pub enum HttpError {
    /// Missing or malformed batch fields
    #[error("Invalid telemetry data")]
    InvalidTelemetry,

    /// A batch failed while being materialized
    #[error("Failed to process telemetry data")]
    ProcessingFailed,
}

/// Error response body
#[derive(Debug, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

impl IntoResponse for HttpError {
    fn into_response(self) -> Response {
        let status = match &self {
            HttpError::InvalidTelemetry => StatusCode::BAD_REQUEST,
            HttpError::ProcessingFailed => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let body = ErrorResponse {
            error: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias using HttpError
pub type Result<T> = std::result::Result<T, HttpError>;
