//! Simple metrics collection for WASM and native environments
//!
//! Atomic counters, gauges and histograms for the pipeline's own
//! observability (batches received, queue depth, request durations).
//! These are internal operational metrics, not part of the journey
//! telemetry product.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use once_cell::sync::Lazy;
use tracing::info;

/// A counter metric that can only increase
#[derive(Clone)]
pub struct Counter {
    name: String,
    value: Arc<AtomicU64>,
}

impl Counter {
    /// Create a new counter
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Increment the counter by 1
    pub fn increment(&self) {
        self.add(1);
    }

    /// Add a value to the counter
    pub fn add(&self, value: u64) {
        self.value.fetch_add(value, Ordering::Relaxed);
    }

    /// Get the current value
    pub fn get(&self) -> u64 {
        self.value.load(Ordering::Relaxed)
    }

    /// Metric name
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A gauge metric that can increase or decrease
#[derive(Clone)]
pub struct Gauge {
    name: String,
    value: Arc<AtomicI64>,
}

impl Gauge {
    /// Create a new gauge
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: Arc::new(AtomicI64::new(0)),
        }
    }

    /// Set the gauge value
    pub fn set(&self, value: i64) {
        self.value.store(value, Ordering::Relaxed);
    }

    /// Increment the gauge by 1
    pub fn increment(&self) {
        self.value.fetch_add(1, Ordering::Relaxed);
    }

    /// Decrement the gauge by 1
    pub fn decrement(&self) {
        self.value.fetch_sub(1, Ordering::Relaxed);
    }

    /// Get the current value
    pub fn get(&self) -> i64 {
        self.value.load(Ordering::Relaxed)
    }

    /// Metric name
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Statistics for a histogram
#[derive(Debug, Clone)]
pub struct HistogramStats {
    pub count: u64,
    pub sum: f64,
    pub mean: f64,
    pub p50: f64,
    pub p95: f64,
    pub p99: f64,
}

/// A histogram metric for recording durations
#[derive(Clone)]
pub struct Histogram {
    name: String,
    observations: Arc<RwLock<Vec<f64>>>,
}

impl Histogram {
    /// Create a new histogram
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            observations: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Record an observation
    pub fn observe(&self, value: f64) {
        if let Ok(mut observations) = self.observations.write() {
            observations.push(value);
        }
    }

    /// Record a duration in seconds
    pub fn observe_duration(&self, duration: Duration) {
        self.observe(duration.as_secs_f64());
    }

    /// Get statistics for the histogram
    pub fn stats(&self) -> Option<HistogramStats> {
        let observations = self.observations.read().ok()?;
        if observations.is_empty() {
            return None;
        }

        let mut sorted = observations.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

        let count = sorted.len() as u64;
        let sum: f64 = sorted.iter().sum();
        let percentile = |p: f64| -> f64 {
            let index = ((count as f64 - 1.0) * p / 100.0) as usize;
            sorted[index]
        };

        Some(HistogramStats {
            count,
            sum,
            mean: sum / count as f64,
            p50: percentile(50.0),
            p95: percentile(95.0),
            p99: percentile(99.0),
        })
    }

    /// Metric name
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Global metrics registry
struct Metrics {
    counters: RwLock<HashMap<String, Counter>>,
    gauges: RwLock<HashMap<String, Gauge>>,
    histograms: RwLock<HashMap<String, Histogram>>,
}

impl Metrics {
    fn new() -> Self {
        Self {
            counters: RwLock::new(HashMap::new()),
            gauges: RwLock::new(HashMap::new()),
            histograms: RwLock::new(HashMap::new()),
        }
    }

    fn counter(&self, name: &str) -> Counter {
        if let Ok(counters) = self.counters.read()
            && let Some(counter) = counters.get(name)
        {
            return counter.clone();
        }

        let counter = Counter::new(name);
        if let Ok(mut counters) = self.counters.write() {
            counters.insert(name.to_string(), counter.clone());
        }
        counter
    }

    fn gauge(&self, name: &str) -> Gauge {
        if let Ok(gauges) = self.gauges.read()
            && let Some(gauge) = gauges.get(name)
        {
            return gauge.clone();
        }

        let gauge = Gauge::new(name);
        if let Ok(mut gauges) = self.gauges.write() {
            gauges.insert(name.to_string(), gauge.clone());
        }
        gauge
    }

    fn histogram(&self, name: &str) -> Histogram {
        if let Ok(histograms) = self.histograms.read()
            && let Some(histogram) = histograms.get(name)
        {
            return histogram.clone();
        }

        let histogram = Histogram::new(name);
        if let Ok(mut histograms) = self.histograms.write() {
            histograms.insert(name.to_string(), histogram.clone());
        }
        histogram
    }

    fn counters_snapshot(&self) -> HashMap<String, u64> {
        self.counters
            .read()
            .ok()
            .map(|counters| {
                counters
                    .iter()
                    .map(|(name, counter)| (name.clone(), counter.get()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn gauges_snapshot(&self) -> HashMap<String, i64> {
        self.gauges
            .read()
            .ok()
            .map(|gauges| {
                gauges
                    .iter()
                    .map(|(name, gauge)| (name.clone(), gauge.get()))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn log_all(&self) {
        if let Ok(counters) = self.counters.read() {
            for (name, counter) in counters.iter() {
                info!(metric_type = "counter", metric_name = %name, value = counter.get(), "Metric value");
            }
        }

        if let Ok(gauges) = self.gauges.read() {
            for (name, gauge) in gauges.iter() {
                info!(metric_type = "gauge", metric_name = %name, value = gauge.get(), "Metric value");
            }
        }

        if let Ok(histograms) = self.histograms.read() {
            for (name, histogram) in histograms.iter() {
                if let Some(stats) = histogram.stats() {
                    info!(
                        metric_type = "histogram",
                        metric_name = %name,
                        count = stats.count,
                        mean = stats.mean,
                        p50 = stats.p50,
                        p95 = stats.p95,
                        p99 = stats.p99,
                        "Metric value"
                    );
                }
            }
        }
    }
}

static METRICS: Lazy<Metrics> = Lazy::new(Metrics::new);

/// Get or create a global counter
pub fn counter(name: &str) -> Counter {
    METRICS.counter(name)
}

/// Get or create a global gauge
pub fn gauge(name: &str) -> Gauge {
    METRICS.gauge(name)
}

/// Get or create a global histogram
pub fn histogram(name: &str) -> Histogram {
    METRICS.histogram(name)
}

/// Log all registered metrics at info level
pub fn log_all_metrics() {
    METRICS.log_all();
}

/// Snapshot all counters by name
pub fn all_counters() -> HashMap<String, u64> {
    METRICS.counters_snapshot()
}

/// Snapshot all gauges by name
pub fn all_gauges() -> HashMap<String, i64> {
    METRICS.gauges_snapshot()
}
