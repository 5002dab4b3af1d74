//! Backend connections and signal handling shared by both binaries.

use anyhow::{Context, Result};
use std::sync::Arc;
use telemetry::health;
use tokio::signal;
use tracing::{error, info, warn};

use tracker_cache::Cache;
use tracker_core::{ApplicationStore, EventStore};
use tracker_store::{check_connection, init_schema, PgApplicationStore, PgEventStore, StoreClient};

use crate::config::AppConfig;

/// Connected stores.
pub struct Backends {
    pub store: StoreClient,
    pub apps: Arc<dyn ApplicationStore>,
    pub events: Arc<dyn EventStore>,
    pub cache: Arc<dyn Cache>,
}

/// Build the pool and cache client, bootstrap the schema, and record the
/// initial health of both. An unreachable store is logged, not fatal; the
/// process starts unready.
pub async fn connect_backends(config: &AppConfig) -> Result<Backends> {
    let store =
        StoreClient::new(config.database.clone()).context("Failed to create PostgreSQL pool")?;

    if check_connection(&store).await {
        health().postgres.set_healthy();
        info!(host = %config.database.host, "PostgreSQL connection: healthy");

        if let Err(e) = init_schema(&store).await {
            error!(error = %e, "Failed to initialize PostgreSQL schema");
        }
    } else {
        health().postgres.set_unhealthy("Connection failed");
        error!(host = %config.database.host, "PostgreSQL connection: unhealthy");
    }

    let cache = tracker_cache::connect(&config.redis).context("Failed to create cache client")?;
    match tracker_cache::health::check_connection(cache.as_ref()).await {
        Ok(()) => {
            health().redis.set_healthy();
            info!("Cache connection: healthy");
        }
        Err(e) => {
            health().redis.set_unhealthy(e.to_string());
            warn!("Cache connection: unhealthy, continuing degraded");
        }
    }

    Ok(Backends {
        apps: Arc::new(PgApplicationStore::new(store.clone())),
        events: Arc::new(PgEventStore::new(store.clone())),
        store,
        cache,
    })
}

/// Resolves on Ctrl+C or SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
