//! Initialization functions for tracing
//!
//! Sets up the tracing subscriber with an env filter and formatting layer,
//! plus optional OpenTelemetry export behind the `otlp` feature.

use anyhow::Result;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::tracing::config::InstrumentationConfig;

/// Initialize tracing with the given configuration
pub fn init_tracing(config: &InstrumentationConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    if let Some(otlp_config) = &config.otlp {
        init_with_otlp(config, otlp_config, env_filter)?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_thread_ids(true);

        tracing_subscriber::registry()
            .with(fmt_layer)
            .with(env_filter)
            .init();
    }

    Ok(())
}

/// Initialize with OTLP export
#[cfg(feature = "otlp")]
fn init_with_otlp(
    config: &InstrumentationConfig,
    otlp_config: &crate::tracing::config::OtlpConfig,
    env_filter: EnvFilter,
) -> Result<()> {
    use opentelemetry::trace::TracerProvider as _;
    use opentelemetry_otlp::WithExportConfig;
    use opentelemetry_sdk::trace::{RandomIdGenerator, Sampler, SdkTracerProvider};
    use tracing_opentelemetry::OpenTelemetryLayer;

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(&otlp_config.endpoint)
        .build()?;

    let tracer_provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_sampler(Sampler::AlwaysOn)
        .with_id_generator(RandomIdGenerator::default())
        .build();

    let otel_layer = OpenTelemetryLayer::new(tracer_provider.tracer(config.service_name.clone()));

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .with(otel_layer)
        .init();

    Ok(())
}

/// Initialize with OTLP export (stub for when the feature is disabled)
#[cfg(not(feature = "otlp"))]
fn init_with_otlp(
    _config: &InstrumentationConfig,
    _otlp_config: &crate::tracing::config::OtlpConfig,
    env_filter: EnvFilter,
) -> Result<()> {
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(true);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .init();

    tracing::warn!("OTLP export requested but the otlp feature is not enabled");
    Ok(())
}

/// Initialize with default configuration from environment
pub fn init_default(service_name: &str) -> Result<()> {
    let config = InstrumentationConfig::from_env(service_name);
    init_tracing(&config)
}
