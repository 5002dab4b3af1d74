//! HTTP-facing configuration: CORS, rate limits, deadlines, public URL.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracker_core::{Error, Result};

/// Cross-origin policy (`cors.*`).
///
/// An origin is allowed when it appears in `allowed_origins` or its host is
/// `parent_domain` or a subdomain of it. There is no wildcard.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    #[serde(default)]
    pub allowed_origins: Vec<String>,
    #[serde(default = "default_allowed_methods")]
    pub allowed_methods: Vec<String>,
    #[serde(default = "default_allowed_headers")]
    pub allowed_headers: Vec<String>,
    #[serde(default)]
    pub allow_credentials: bool,
    /// Preflight cache in seconds
    #[serde(default = "default_max_age")]
    pub max_age: u64,
    #[serde(default)]
    pub parent_domain: Option<String>,
}

fn default_allowed_methods() -> Vec<String> {
    ["GET", "POST", "PUT", "DELETE", "OPTIONS"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_allowed_headers() -> Vec<String> {
    ["content-type", "x-api-key", "if-none-match"]
        .into_iter()
        .map(String::from)
        .collect()
}

fn default_max_age() -> u64 {
    86400
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: Vec::new(),
            allowed_methods: default_allowed_methods(),
            allowed_headers: default_allowed_headers(),
            allow_credentials: false,
            max_age: default_max_age(),
            parent_domain: None,
        }
    }
}

/// Fixed-window limits (`rate_limit.*`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u64,
    /// 0 disables the hourly bucket
    #[serde(default = "default_requests_per_hour")]
    pub requests_per_hour: u64,
    #[serde(default = "default_burst_size")]
    pub burst_size: u64,
}

fn default_requests_per_minute() -> u64 {
    2000
}

fn default_requests_per_hour() -> u64 {
    20000
}

fn default_burst_size() -> u64 {
    200
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: default_requests_per_minute(),
            requests_per_hour: default_requests_per_hour(),
            burst_size: default_burst_size(),
        }
    }
}

impl RateLimitConfig {
    /// `burst_size <= requests_per_minute <= requests_per_hour`.
    pub fn validate(&self) -> Result<()> {
        let mut details = Vec::new();
        if self.requests_per_minute == 0 {
            details.push("rate_limit.requests_per_minute: must be positive".to_string());
        }
        if self.burst_size > self.requests_per_minute {
            details.push(
                "rate_limit.burst_size: must not exceed requests_per_minute".to_string(),
            );
        }
        if self.requests_per_hour != 0 && self.requests_per_minute > self.requests_per_hour {
            details.push(
                "rate_limit.requests_per_minute: must not exceed requests_per_hour".to_string(),
            );
        }
        if details.is_empty() {
            Ok(())
        } else {
            Err(Error::validation_with_details("Invalid rate limit configuration", details))
        }
    }
}

/// Per-request budgets in seconds (`timeouts.*`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_default_secs")]
    pub default_secs: u64,
    #[serde(default = "default_tracking_secs")]
    pub tracking_secs: u64,
    #[serde(default = "default_long_running_secs")]
    pub long_running_secs: u64,
    #[serde(default = "default_store_secs")]
    pub store_secs: u64,
    #[serde(default = "default_external_secs")]
    pub external_secs: u64,
}

fn default_default_secs() -> u64 {
    30
}

fn default_tracking_secs() -> u64 {
    5
}

fn default_long_running_secs() -> u64 {
    120
}

fn default_store_secs() -> u64 {
    10
}

fn default_external_secs() -> u64 {
    15
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            default_secs: default_default_secs(),
            tracking_secs: default_tracking_secs(),
            long_running_secs: default_long_running_secs(),
            store_secs: default_store_secs(),
            external_secs: default_external_secs(),
        }
    }
}

impl TimeoutConfig {
    pub fn default_budget(&self) -> Duration {
        Duration::from_secs(self.default_secs)
    }

    pub fn tracking(&self) -> Duration {
        Duration::from_secs(self.tracking_secs)
    }

    pub fn long_running(&self) -> Duration {
        Duration::from_secs(self.long_running_secs)
    }

    pub fn store(&self) -> Duration {
        Duration::from_secs(self.store_secs)
    }

    pub fn external(&self) -> Duration {
        Duration::from_secs(self.external_secs)
    }
}

/// Everything the router needs from configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL embedded in generated beacon snippets
    #[serde(default = "default_public_url")]
    pub public_url: String,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
}

fn default_public_url() -> String {
    "http://localhost:8080".to_string()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            public_url: default_public_url(),
            debug: false,
            cors: CorsConfig::default(),
            rate_limit: RateLimitConfig::default(),
            timeouts: TimeoutConfig::default(),
        }
    }
}

impl ApiConfig {
    pub fn validate(&self) -> Result<()> {
        self.rate_limit.validate()?;
        url::Url::parse(&self.public_url)
            .map_err(|e| Error::validation(format!("app.public_url: {}", e)))?;
        Ok(())
    }

    /// `public_url` without a trailing slash.
    pub fn base_url(&self) -> &str {
        self.public_url.trim_end_matches('/')
    }
}
