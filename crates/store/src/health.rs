//! PostgreSQL health checks and schema bootstrap.

use tracing::{debug, error};
use tracker_core::Result;

use crate::client::StoreClient;
use crate::error::db_error;
use crate::schema::all_tables;

/// Check PostgreSQL connection health.
pub async fn check_connection(client: &StoreClient) -> bool {
    match client.ping().await {
        Ok(()) => {
            debug!("PostgreSQL connection healthy");
            true
        }
        Err(e) => {
            error!(error = %e, "PostgreSQL health check failed");
            false
        }
    }
}

/// Create tables and indexes if missing.
pub async fn init_schema(client: &StoreClient) -> Result<()> {
    for ddl in all_tables() {
        sqlx::query(ddl)
            .execute(client.pool())
            .await
            .map_err(|e| db_error(e, "schema"))?;
    }

    debug!("PostgreSQL schema initialized");
    Ok(())
}
