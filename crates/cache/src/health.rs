//! Cache health checks.

use tracing::{debug, error};

use crate::client::Cache;
use crate::error::CacheResult;

/// Ping the cache, logging the outcome.
pub async fn check_connection(cache: &dyn Cache) -> CacheResult<()> {
    match cache.ping().await {
        Ok(()) => {
            debug!("Cache connection healthy");
            Ok(())
        }
        Err(e) => {
            error!(error = %e, "Cache health check failed");
            Err(e)
        }
    }
}
