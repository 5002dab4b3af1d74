//! Web tracker HTTP server.
//!
//! Serves the tracking API, the beacon pixel and scripts, statistics, and
//! application management.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use tracing::info;

use telemetry::init_tracing;
use tracker_api::{router, AppState};
use web_tracker::{connect_backends, load_config, shutdown_signal};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = load_config()?;
    init_tracing(&config.logging).context("Failed to initialize logging")?;

    info!(
        "Starting web tracker server v{}",
        env!("CARGO_PKG_VERSION")
    );
    info!(database = ?config.database, redis = ?config.redis, "Loaded configuration");

    let backends = connect_backends(&config).await?;

    let state = AppState::new(
        backends.apps.clone(),
        backends.events.clone(),
        backends.cache.clone(),
        config.api_config(),
    );
    let app = router(state);

    let addr = config.listen_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    info!("Listening on http://{}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("Server error")?;

    info!("Shutting down...");
    backends.store.close().await;
    info!("Shutdown complete");
    Ok(())
}
