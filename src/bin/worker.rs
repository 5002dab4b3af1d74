//! Web tracker background worker: retention, health probes, metrics log.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use telemetry::init_tracing;
use tracker_worker::{HealthProbe, RetentionWorker, WorkerConfig, WorkerScheduler};
use web_tracker::{connect_backends, load_config, shutdown_signal};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = load_config()?;
    init_tracing(&config.logging).context("Failed to initialize logging")?;

    info!(
        "Starting web tracker worker v{}",
        env!("CARGO_PKG_VERSION")
    );

    let backends = connect_backends(&config).await?;

    let retention = RetentionWorker::new(
        backends.apps.clone(),
        backends.events.clone(),
        config.retention.clone(),
    )
    .with_delete_budget(config.timeouts.store());
    let probe = HealthProbe::new(
        backends.apps.clone(),
        backends.cache.clone(),
        config.timeouts.external(),
    );

    let scheduler = Arc::new(WorkerScheduler::new(
        WorkerConfig {
            retention_interval: config.retention.interval(),
            ..WorkerConfig::default()
        },
        retention,
        probe,
    ));
    let handles = scheduler.start();

    shutdown_signal().await;

    info!("Shutting down...");
    for handle in handles {
        handle.abort();
    }
    backends.store.close().await;
    info!("Shutdown complete");
    Ok(())
}
