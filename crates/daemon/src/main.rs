use anyhow::Result;
use clap::Parser;
use tracing::info;

use waypoint_core::tracing::{config::InstrumentationConfig, init::init_tracing};
use waypoint_daemon::{Settings, build_router};

/// Waypoint daemon - browser telemetry ingestion service
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short = 'c', long = "config")]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let instrumentation = InstrumentationConfig::from_env("waypoint-daemon");
    init_tracing(&instrumentation)?;

    let settings = match cli.config {
        Some(path) => {
            info!("Loading configuration from: {}", path);
            Settings::load_from_file(&path)?
        }
        None => Settings::from_env()?,
    };

    let router = build_router(&settings.server);
    let listener = tokio::net::TcpListener::bind(settings.server.bind_addr).await?;
    info!("Telemetry ingestion listening on {}", listener.local_addr()?);

    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Received shutdown signal");
        })
        .await?;

    // Last look at the pipeline's own counters before exiting
    waypoint_core::tracing::metrics::log_all_metrics();

    Ok(())
}
