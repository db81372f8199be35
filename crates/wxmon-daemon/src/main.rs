//! wxmond - city weather monitor daemon
//!
//! This binary coordinates:
//! - Polling city weather sources on a fixed interval
//! - Daily summary aggregation and persistence
//! - The HTTP presentation API

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use wxmon_archive::DailyAggregator;
use wxmon_core::Threshold;
use wxmon_daemon::{DaemonConfig, Scheduler};

#[tokio::main]
async fn main() -> Result<()> {
    wxmon_obs::init("wxmond");

    info!("Starting city weather monitor");

    let config = DaemonConfig::from_env()?;
    info!("Loaded configuration: {:?}", config);

    let store = config.build_store()?;
    let aggregator = DailyAggregator::open(store).await;
    let fetcher = config.build_fetcher()?;
    info!("Sample fetcher ready: {}", fetcher.name());

    let threshold = Threshold::new(config.threshold);
    let (app, state) = wxmon_api::build_app(threshold.clone())?;

    let mut scheduler = Scheduler::new(
        fetcher,
        config.sources.clone(),
        aggregator,
        threshold,
        config.interval,
    )
    .with_publisher(state.clone());

    let listener = tokio::net::TcpListener::bind(&config.http_bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.http_bind))?;
    info!("HTTP API listening on {}", config.http_bind);
    wxmon_api::set_ready(&state, true);

    let cancel = CancellationToken::new();

    let server_cancel = cancel.clone();
    let server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_cancel.cancelled().await })
            .await
    });

    let scheduler_cancel = cancel.clone();
    let polling = tokio::spawn(async move { scheduler.run(scheduler_cancel).await });

    info!("Daemon running - press Ctrl+C to stop");
    shutdown_signal().await;

    info!("Shutdown signal received");
    wxmon_api::set_ready(&state, false);
    cancel.cancel();

    if let Err(e) = polling.await {
        error!("Scheduler task failed: {}", e);
    }
    match server.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("HTTP server error: {}", e),
        Err(e) => error!("HTTP server task failed: {}", e),
    }

    info!("City weather monitor stopped");
    Ok(())
}

/// Wait for Ctrl+C; without a signal handler the daemon runs until killed
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
