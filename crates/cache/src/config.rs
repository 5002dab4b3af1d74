//! Cache configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::error::{CacheError, CacheResult};

/// Host value selecting the in-process cache.
pub const MEMORY_HOST: &str = "memory";

/// Redis connection configuration (`redis.*`).
#[derive(Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis host, or "memory" for the in-process cache.
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub password: Option<String>,
    /// Logical database index.
    #[serde(default)]
    pub db: i64,
    /// Maximum pooled connections.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
    /// Per-command and pool-wait timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    6379
}

fn default_pool_size() -> usize {
    16
}

fn default_timeout_ms() -> u64 {
    500
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            password: None,
            db: 0,
            pool_size: default_pool_size(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl std::fmt::Debug for RedisConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("db", &self.db)
            .field("pool_size", &self.pool_size)
            .field("timeout_ms", &self.timeout_ms)
            .finish()
    }
}

impl RedisConfig {
    pub fn is_memory(&self) -> bool {
        self.host.eq_ignore_ascii_case(MEMORY_HOST)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Connection URL with the password percent-encoded.
    pub fn url(&self) -> CacheResult<String> {
        let mut url = Url::parse(&format!("redis://{}:{}/{}", self.host, self.port, self.db))
            .map_err(|e| CacheError::Config(format!("invalid redis address: {}", e)))?;
        if let Some(ref password) = self.password {
            if !password.is_empty() {
                url.set_password(Some(password))
                    .map_err(|_| CacheError::Config("cannot set redis password".into()))?;
            }
        }
        Ok(url.to_string())
    }
}
