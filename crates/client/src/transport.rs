//! Outbound telemetry transport
//!
//! A single FIFO queue of finalized journeys and standalone critical events,
//! flushed by four triggers in order of precedence: a critical enqueue, the
//! queue reaching the batch size, the periodic timer, and page teardown.
//! Delivery is strictly best-effort; a failed batch is re-queued at the head
//! bounded to one batch's worth, and anything beyond that bound is dropped.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;

use waypoint_core::market;
use waypoint_core::model::EventPriority;
use waypoint_core::wire::{BrowserInfo, EventEnvelope, TelemetryBatch, TelemetryPayload};

use crate::session::{Session, now_ms};

/// Errors surfaced by batch delivery
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("Network unreachable: {0}")]
    Network(String),

    #[error("Server responded with status {0}")]
    Status(u16),

    #[error("Failed to encode batch: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Final delivery attempt failed")]
    FinalDeliveryFailed,
}

impl TransportError {
    /// Whether the failed batch should be re-queued for the next flush
    ///
    /// Only failures where the server never answered are retried; a 4xx/5xx
    /// response means the batch was received and is terminal either way.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Request(_) | Self::Network(_))
    }
}

/// Transport tuning knobs
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Maximum items per delivered batch, and the outstanding-queue bound
    pub batch_size: usize,
    /// Periodic flush interval
    pub flush_interval: Duration,
    /// Payload ceiling for the teardown transmission primitive
    pub beacon_limit_bytes: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            flush_interval: Duration::from_secs(10),
            beacon_limit_bytes: 60_000,
        }
    }
}

/// One queued delivery unit: a finalized journey or a standalone critical event
#[derive(Debug, Clone)]
pub struct QueueItem {
    pub payload: TelemetryPayload,
    pub priority: EventPriority,
    /// Enqueue time, milliseconds since the Unix epoch
    pub enqueued_at: f64,
}

/// Delivery seam between the transport queue and the network
///
/// `deliver` is the normal asynchronous path; `deliver_final` is the
/// guaranteed-attempt path usable while the page context is being torn
/// down, when a normal round trip cannot be awaited.
#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
pub trait TelemetrySink {
    async fn deliver(&self, batch: &TelemetryBatch) -> Result<(), TransportError>;

    fn deliver_final(&self, batch: &TelemetryBatch) -> Result<(), TransportError>;
}

#[cfg(not(target_arch = "wasm32"))]
pub type SharedSink = Arc<dyn TelemetrySink + Send + Sync>;
#[cfg(target_arch = "wasm32")]
pub type SharedSink = Arc<dyn TelemetrySink>;

/// The outbound queue and its flush scheduling
pub struct TransportLayer {
    config: TransportConfig,
    session: Session,
    queue: Mutex<VecDeque<QueueItem>>,
    sink: SharedSink,
}

impl TransportLayer {
    pub fn new(config: TransportConfig, session: Session, sink: SharedSink) -> Self {
        Self {
            config,
            session,
            queue: Mutex::new(VecDeque::new()),
            sink,
        }
    }

    /// Current queue depth
    pub fn queue_len(&self) -> usize {
        self.queue.lock().map(|queue| queue.len()).unwrap_or(0)
    }

    /// Enqueue a payload and kick an immediate flush when warranted
    pub fn enqueue(self: &Arc<Self>, payload: TelemetryPayload, priority: EventPriority) {
        if self.push(payload, priority) {
            Self::spawn_flush(self);
        }
    }

    /// Enqueue without scheduling; returns whether a flush should run now
    ///
    /// Exposed separately so embedders driving their own scheduler (and
    /// tests) can make the flush decision observable.
    pub fn push(&self, payload: TelemetryPayload, priority: EventPriority) -> bool {
        let Ok(mut queue) = self.queue.lock() else {
            return false;
        };

        queue.push_back(QueueItem {
            payload,
            priority,
            enqueued_at: now_ms(),
        });

        let trigger = priority == EventPriority::Critical || queue.len() >= self.config.batch_size;
        if trigger {
            Self::enforce_bound(&mut queue, self.config.batch_size);
        }
        trigger
    }

    // Oldest items are dropped first; telemetry loss under sustained
    // backlog is accepted.
    fn enforce_bound(queue: &mut VecDeque<QueueItem>, bound: usize) {
        while queue.len() > bound {
            queue.pop_front();
        }
    }

    /// Flush up to one batch over the asynchronous path
    ///
    /// On failure the batch is re-queued at the head, bounded to
    /// `batch_size` outstanding items. Returns the number of delivered
    /// items.
    pub async fn flush(&self) -> Result<usize, TransportError> {
        let items: Vec<QueueItem> = {
            let Ok(mut queue) = self.queue.lock() else {
                return Ok(0);
            };
            let take = queue.len().min(self.config.batch_size);
            queue.drain(..take).collect()
        };

        if items.is_empty() {
            return Ok(0);
        }

        let batch = self.build_batch(&items);
        match self.sink.deliver(&batch).await {
            Ok(()) => Ok(items.len()),
            Err(err) if err.is_retryable() => {
                tracing::warn!(error = %err, items = items.len(), "Telemetry flush failed, re-queueing batch");
                if let Ok(mut queue) = self.queue.lock() {
                    for item in items.into_iter().rev() {
                        queue.push_front(item);
                    }
                    Self::enforce_bound(&mut queue, self.config.batch_size);
                }
                Err(err)
            }
            Err(err) => {
                tracing::warn!(error = %err, items = items.len(), "Telemetry batch rejected, dropping");
                Err(err)
            }
        }
    }

    /// Teardown flush over the guaranteed-attempt path
    ///
    /// Drains the whole queue and truncates the payload (newest first) to
    /// the teardown primitive's size ceiling. Returns the number of items
    /// handed to the primitive.
    pub fn flush_teardown(&self) -> Result<usize, TransportError> {
        let items: Vec<QueueItem> = {
            let Ok(mut queue) = self.queue.lock() else {
                return Ok(0);
            };
            queue.drain(..).collect()
        };

        if items.is_empty() {
            return Ok(0);
        }

        let mut batch = self.build_batch(&items);
        while serde_json::to_string(&batch)?.len() > self.config.beacon_limit_bytes {
            if batch.events.pop().is_none() {
                break;
            }
        }

        let sent = batch.events.len();
        self.sink.deliver_final(&batch)?;
        Ok(sent)
    }

    fn build_batch(&self, items: &[QueueItem]) -> TelemetryBatch {
        TelemetryBatch {
            session_id: self.session.id.clone(),
            events: items
                .iter()
                .map(|item| EventEnvelope {
                    data: item.payload.clone(),
                    priority: item.priority,
                    timestamp: item.enqueued_at,
                })
                .collect(),
            browser_info: Some(BrowserInfo {
                user_agent: self.session.user_agent.clone(),
                url: self.session.url.clone(),
                market_session: market::classify_now(),
                timestamp: now_ms(),
            }),
        }
    }

    /// Fire an asynchronous flush without awaiting it
    #[cfg(not(target_arch = "wasm32"))]
    pub fn spawn_flush(this: &Arc<Self>) {
        let transport = Arc::clone(this);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                let _ = transport.flush().await;
            });
        }
    }

    /// Fire an asynchronous flush without awaiting it
    #[cfg(target_arch = "wasm32")]
    pub fn spawn_flush(this: &Arc<Self>) {
        let transport = Arc::clone(this);
        wasm_bindgen_futures::spawn_local(async move {
            let _ = transport.flush().await;
        });
    }

    /// Start the periodic flush timer
    #[cfg(not(target_arch = "wasm32"))]
    pub fn start_interval(this: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let transport = Arc::clone(this);
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(transport.config.flush_interval);
            interval.tick().await;
            loop {
                interval.tick().await;
                let _ = transport.flush().await;
            }
        })
    }

    /// Start the periodic flush timer; the returned handle must be kept
    /// (or forgotten) for the timer to keep firing
    #[cfg(target_arch = "wasm32")]
    pub fn start_interval(this: &Arc<Self>) -> gloo_timers::callback::Interval {
        let transport = Arc::clone(this);
        let millis = this.config.flush_interval.as_millis() as u32;
        gloo_timers::callback::Interval::new(millis, move || {
            Self::spawn_flush(&transport);
        })
    }
}

/// HTTP sink posting batches to the ingestion endpoint
pub struct HttpSink {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpSink {
    /// `endpoint` is the full ingestion URL, e.g. `https://host/telemetry/browser`
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait::async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait::async_trait(?Send))]
impl TelemetrySink for HttpSink {
    async fn deliver(&self, batch: &TelemetryBatch) -> Result<(), TransportError> {
        let response = self.client.post(&self.endpoint).json(batch).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(TransportError::Status(response.status().as_u16()))
        }
    }

    #[cfg(target_arch = "wasm32")]
    fn deliver_final(&self, batch: &TelemetryBatch) -> Result<(), TransportError> {
        let body = serde_json::to_string(batch)?;
        if crate::browser::send_beacon(&self.endpoint, &body) {
            Ok(())
        } else {
            Err(TransportError::FinalDeliveryFailed)
        }
    }

    // There is no sendBeacon equivalent off-wasm; detach a fire-and-forget
    // send on the current runtime instead.
    #[cfg(not(target_arch = "wasm32"))]
    fn deliver_final(&self, batch: &TelemetryBatch) -> Result<(), TransportError> {
        let body = serde_json::to_string(batch)?;
        let client = self.client.clone();
        let endpoint = self.endpoint.clone();

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return Err(TransportError::FinalDeliveryFailed);
        };
        handle.spawn(async move {
            let _ = client
                .post(&endpoint)
                .header(http::header::CONTENT_TYPE, "application/json")
                .body(body)
                .send()
                .await;
        });
        Ok(())
    }
}
