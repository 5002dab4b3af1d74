//! Key-value cache client for the web tracker.
//!
//! Backs the API-key lookup cache, the statistics cache, and the
//! rate-limit counters. Failures surface as [`CacheError`]; callers treat
//! them as misses (reads) or fail open (rate limiting).

pub mod client;
pub mod config;
pub mod error;
pub mod health;
pub mod keys;
pub mod memory;
pub mod redis;

use std::sync::Arc;
use tracing::info;

pub use client::{Cache, CacheExt, Command, Pipeline, PipelineReplies, Reply, ReplyHandle};
pub use config::RedisConfig;
pub use error::{CacheError, CacheResult};
pub use memory::MemoryCache;
pub use redis::RedisCache;

/// Build the cache selected by `config`.
pub fn connect(config: &RedisConfig) -> CacheResult<Arc<dyn Cache>> {
    if config.is_memory() {
        info!("Using in-process cache");
        return Ok(Arc::new(MemoryCache::new()));
    }
    info!(host = %config.host, port = config.port, "Using Redis cache");
    Ok(Arc::new(RedisCache::new(config)?))
}
