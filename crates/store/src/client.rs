//! PostgreSQL pool wrapper.

use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::info;
use tracker_core::Result;

use crate::config::DatabaseConfig;
use crate::error::db_error;

/// Shared connection pool. Cloning is cheap.
#[derive(Clone)]
pub struct StoreClient {
    pool: PgPool,
    config: DatabaseConfig,
}

impl StoreClient {
    /// Create the pool. Connections open lazily, so a database that is
    /// down at startup shows up in readiness rather than aborting.
    pub fn new(config: DatabaseConfig) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_open_conns.max(1))
            .min_connections(config.min_connections())
            .max_lifetime(config.max_lifetime())
            .acquire_timeout(config.acquire_timeout())
            .connect_lazy_with(config.connect_options()?);

        info!(
            host = %config.host,
            port = config.port,
            database = %config.name,
            max_open_conns = config.max_open_conns,
            "Created PostgreSQL pool"
        );

        Ok(Self { pool, config })
    }

    /// Wrap an existing pool (tests).
    pub fn from_pool(pool: PgPool, config: DatabaseConfig) -> Self {
        Self { pool, config }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Round-trip a trivial query.
    pub async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| db_error(e, "connection"))?;
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}
