//! Trace and correlation identifiers
//!
//! Journeys are correlated across the browser/backend boundary through a
//! pair of identifiers: a 16-byte trace id naming the journey and an 8-byte
//! span id naming one unit of work inside it. Both travel hex-encoded in
//! `x-*` request headers rather than a W3C traceparent, because the browser
//! library also uses them as plain attribute values.

use std::fmt;
use std::str::FromStr;

use http::{HeaderMap, HeaderName, HeaderValue};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;

/// Trace id header attached to outbound business API calls
pub const TRACE_ID_HEADER: &str = "x-trace-id";
/// Parent span id header attached to outbound business API calls
pub const PARENT_SPAN_ID_HEADER: &str = "x-parent-span-id";
/// Browser session id header
pub const BROWSER_SESSION_HEADER: &str = "x-browser-session";
/// Optional business-entity correlation header
pub const PORTFOLIO_ID_HEADER: &str = "x-portfolio-id";
/// Response header acknowledging recognized correlation
pub const BACKEND_CORRELATION_HEADER: &str = "x-backend-trace-correlation";

/// Errors that can occur when parsing or injecting correlation identifiers
#[derive(Error, Debug)]
pub enum ContextError {
    #[error("Invalid trace ID")]
    InvalidTraceId,
    #[error("Invalid span ID")]
    InvalidSpanId,
    #[error("Invalid header value: {0}")]
    InvalidHeaderValue(String),
}

fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];

    // Use getrandom for WASM compatibility
    #[cfg(target_arch = "wasm32")]
    getrandom::fill(&mut bytes).expect("Failed to read browser random source");

    #[cfg(not(target_arch = "wasm32"))]
    {
        use rand::Rng;
        rand::thread_rng().fill(&mut bytes[..]);
    }

    bytes
}

/// A 16-byte journey/trace identifier, hex-encoded on the wire
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TraceId([u8; 16]);

impl TraceId {
    /// Generate a fresh random trace id
    pub fn generate() -> Self {
        loop {
            let bytes = random_bytes::<16>();
            // All-zero ids are reserved as invalid
            if bytes.iter().any(|&b| b != 0) {
                return Self(bytes);
            }
        }
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Construct from raw bytes; rejects the all-zero id
    pub fn from_bytes(bytes: [u8; 16]) -> Result<Self, ContextError> {
        if bytes.iter().all(|&b| b == 0) {
            return Err(ContextError::InvalidTraceId);
        }
        Ok(Self(bytes))
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for TraceId {
    type Err = ContextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 16];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| ContextError::InvalidTraceId)?;
        Self::from_bytes(bytes)
    }
}

/// An 8-byte span identifier, hex-encoded on the wire
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SpanId([u8; 8]);

impl SpanId {
    /// Generate a fresh random span id
    pub fn generate() -> Self {
        loop {
            let bytes = random_bytes::<8>();
            if bytes.iter().any(|&b| b != 0) {
                return Self(bytes);
            }
        }
    }

    /// Get the raw bytes
    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }

    /// Construct from raw bytes; rejects the all-zero id
    pub fn from_bytes(bytes: [u8; 8]) -> Result<Self, ContextError> {
        if bytes.iter().all(|&b| b == 0) {
            return Err(ContextError::InvalidSpanId);
        }
        Ok(Self(bytes))
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for SpanId {
    type Err = ContextError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 8];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| ContextError::InvalidSpanId)?;
        Self::from_bytes(bytes)
    }
}

macro_rules! hex_serde {
    ($ty:ty) => {
        impl Serialize for $ty {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $ty {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

hex_serde!(TraceId);
hex_serde!(SpanId);

/// Correlation identifiers read from (or written to) request headers
///
/// The browser attaches these to every business API call it makes while a
/// journey is open; server-side request handlers read them back to attribute
/// their own spans to the originating journey.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CorrelationContext {
    pub trace_id: TraceId,
    pub parent_span_id: Option<SpanId>,
    pub session_id: Option<String>,
    pub portfolio_id: Option<String>,
}

impl CorrelationContext {
    /// Create a context for a journey with no entity correlation
    pub fn new(trace_id: TraceId, parent_span_id: SpanId) -> Self {
        Self {
            trace_id,
            parent_span_id: Some(parent_span_id),
            session_id: None,
            portfolio_id: None,
        }
    }

    /// Attach the browser session id
    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Attach a business-entity id (e.g. the portfolio being viewed)
    pub fn with_portfolio(mut self, portfolio_id: impl Into<String>) -> Self {
        self.portfolio_id = Some(portfolio_id.into());
        self
    }

    /// Extract correlation identifiers from request headers
    ///
    /// Returns `None` when no valid `x-trace-id` is present; an invalid
    /// parent span id is dropped rather than failing the whole context.
    pub fn extract(headers: &HeaderMap) -> Option<Self> {
        let trace_id = headers
            .get(TRACE_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())?;

        let parent_span_id = headers
            .get(PARENT_SPAN_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok());

        let header_string = |name: &'static str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };

        Some(Self {
            trace_id,
            parent_span_id,
            session_id: header_string(BROWSER_SESSION_HEADER),
            portfolio_id: header_string(PORTFOLIO_ID_HEADER),
        })
    }

    /// Inject correlation identifiers into request headers
    pub fn inject(&self, headers: &mut HeaderMap) -> Result<(), ContextError> {
        let put = |headers: &mut HeaderMap, name: &'static str, value: &str| {
            let value = HeaderValue::from_str(value)
                .map_err(|_| ContextError::InvalidHeaderValue(value.to_string()))?;
            headers.insert(HeaderName::from_static(name), value);
            Ok(())
        };

        put(headers, TRACE_ID_HEADER, &self.trace_id.to_string())?;
        if let Some(span_id) = &self.parent_span_id {
            put(headers, PARENT_SPAN_ID_HEADER, &span_id.to_string())?;
        }
        if let Some(session_id) = &self.session_id {
            put(headers, BROWSER_SESSION_HEADER, session_id)?;
        }
        if let Some(portfolio_id) = &self.portfolio_id {
            put(headers, PORTFOLIO_ID_HEADER, portfolio_id)?;
        }
        Ok(())
    }
}
