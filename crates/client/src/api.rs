//! Correlation-aware dashboard API client
//!
//! Wraps outbound business API calls: stamps the active journey's
//! identifiers onto the request headers so server-side request spans can be
//! attributed back to the originating journey, and records each call as a
//! child span on that journey once it settles, success or failure.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use http::HeaderMap;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

use waypoint_core::model::AttrMap;
use waypoint_core::tracing::context::{
    BROWSER_SESSION_HEADER, CorrelationContext, SpanId, TraceId,
};
use waypoint_core::wire::SPAN_TYPE_ATTR;

use crate::session::now_ms;
use crate::tracer::JourneyTracer;

/// Errors surfaced by API calls
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Server responded with status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Dashboard API client with journey correlation
#[derive(Clone)]
pub struct DashboardApi {
    client: reqwest::Client,
    base_url: String,
    tracer: Arc<JourneyTracer>,
    portfolio_id: Arc<Mutex<Option<String>>>,
}

impl DashboardApi {
    /// Create a client with default configuration
    pub fn new(base_url: impl Into<String>, tracer: Arc<JourneyTracer>) -> Result<Self, ApiError> {
        Self::builder().base_url(base_url).build(tracer)
    }

    /// Create a client builder
    pub fn builder() -> DashboardApiBuilder {
        DashboardApiBuilder::default()
    }

    /// Get the base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Set the portfolio the user is currently viewing; attached to every
    /// request as the entity-correlation header
    pub fn set_portfolio(&self, portfolio_id: Option<String>) {
        if let Ok(mut current) = self.portfolio_id.lock() {
            *current = portfolio_id;
        }
    }

    /// Issue a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send(reqwest::Method::GET, path, None::<&()>).await
    }

    /// Issue a POST request with a JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send(reqwest::Method::POST, path, Some(body)).await
    }

    async fn send<T: DeserializeOwned, B: Serialize>(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ApiError> {
        let journey = self.tracer.current_journey();
        let url = format!("{}{}", self.base_url, path);

        let mut request = self.client.request(method.clone(), &url);
        request = request.headers(self.correlation_headers(&journey));
        if let Some(body) = body {
            request = request.json(body);
        }

        let span_name = format!("{method} {path}");
        let started = now_ms();
        let mut attrs = AttrMap::new();
        attrs.insert("http.method".to_string(), method.as_str().into());
        attrs.insert("http.url".to_string(), url.into());
        attrs.insert(SPAN_TYPE_ATTR.to_string(), "http_request".into());

        let outcome = request.send().await;
        let settled = now_ms();

        let result = match outcome {
            Ok(response) => {
                let status = response.status();
                attrs.insert("http.status_code".to_string(), f64::from(status.as_u16()).into());
                attrs.insert("success".to_string(), status.is_success().into());

                if status.is_success() {
                    response.json::<T>().await.map_err(ApiError::from)
                } else {
                    let message = response.text().await.unwrap_or_else(|_| status.to_string());
                    Err(ApiError::Status {
                        status: status.as_u16(),
                        message,
                    })
                }
            }
            Err(err) => {
                attrs.insert("error.name".to_string(), "request_error".into());
                attrs.insert("error.message".to_string(), err.to_string().into());
                attrs.insert("success".to_string(), false.into());
                Err(ApiError::from(err))
            }
        };

        // The call is recorded whether it succeeded or not
        if let Some((trace_id, _)) = journey {
            self.tracer
                .add_journey_span(trace_id, &span_name, started, settled, attrs);
        }

        result
    }

    fn correlation_headers(&self, journey: &Option<(TraceId, SpanId)>) -> HeaderMap {
        let mut headers = HeaderMap::new();
        let session_id = self.tracer.session().id.clone();

        if let Some((trace_id, span_id)) = journey {
            let mut context =
                CorrelationContext::new(*trace_id, *span_id).with_session(session_id);
            if let Some(portfolio_id) = self.portfolio_id.lock().ok().and_then(|p| p.clone()) {
                context = context.with_portfolio(portfolio_id);
            }
            if let Err(err) = context.inject(&mut headers) {
                tracing::warn!(error = %err, "Failed to inject correlation headers");
            }
        } else if let Ok(value) = http::HeaderValue::from_str(&session_id) {
            // No open journey: still identify the session
            headers.insert(http::HeaderName::from_static(BROWSER_SESSION_HEADER), value);
        }

        headers
    }
}

/// Builder for [`DashboardApi`]
#[derive(Default)]
pub struct DashboardApiBuilder {
    base_url: Option<String>,
    user_agent: Option<String>,
    timeout: Option<Duration>,
}

impl DashboardApiBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the client
    pub fn build(self, tracer: Arc<JourneyTracer>) -> Result<DashboardApi, ApiError> {
        let base_url = self
            .base_url
            .ok_or_else(|| ApiError::Configuration("base_url is required".into()))?;
        let base_url = base_url.trim_end_matches('/').to_string();

        let mut client_builder = reqwest::ClientBuilder::new();

        #[cfg(not(target_arch = "wasm32"))]
        if let Some(timeout) = self.timeout {
            client_builder = client_builder.timeout(timeout);
        }

        if let Some(user_agent) = self.user_agent {
            client_builder = client_builder.user_agent(user_agent);
        }

        Ok(DashboardApi {
            client: client_builder.build()?,
            base_url,
            tracer,
            portfolio_id: Arc::new(Mutex::new(None)),
        })
    }
}
