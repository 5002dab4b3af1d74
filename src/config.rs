//! Layered configuration: built-in defaults, then the YAML file named by
//! `APP_CONFIG`, then `TRACKER__SECTION__KEY` environment variables.

use anyhow::{anyhow, bail, Context, Result};
use config::builder::DefaultState;
use config::{ConfigBuilder, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;

use telemetry::LoggingConfig;
use tracker_api::{ApiConfig, CorsConfig, RateLimitConfig, TimeoutConfig};
use tracker_cache::RedisConfig;
use tracker_store::DatabaseConfig;
use tracker_worker::RetentionConfig;

/// Environment variable naming the YAML config file.
pub const CONFIG_PATH_VAR: &str = "APP_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "config/default.yaml";
pub const ENV_PREFIX: &str = "TRACKER";

/// Keys whose environment values are comma-separated lists.
const LIST_KEYS: &[&str] = &[
    "cors.allowed_origins",
    "cors.allowed_methods",
    "cors.allowed_headers",
];

/// Listener and public identity (`app.*`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub debug: bool,
    /// Base URL used in generated beacon snippets
    #[serde(default = "default_public_url")]
    pub public_url: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_public_url() -> String {
    "http://localhost:8080".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            debug: false,
            public_url: default_public_url(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub app: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub timeouts: TimeoutConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
}

impl AppConfig {
    /// Reject configurations the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        self.api_config().validate().map_err(|e| {
            let details = e.details().map(|d| d.join("; ")).unwrap_or_default();
            anyhow!("{} {}", e.public_message(), details)
        })?;
        if self.database.max_open_conns == 0 {
            bail!("database.max_open_conns must be greater than 0");
        }
        if self.database.max_idle_conns > self.database.max_open_conns {
            bail!("database.max_idle_conns must not exceed database.max_open_conns");
        }
        if self.redis.pool_size == 0 {
            bail!("redis.pool_size must be greater than 0");
        }
        if self.timeouts.tracking_secs == 0 || self.timeouts.default_secs == 0 {
            bail!("timeouts must be greater than 0");
        }
        Ok(())
    }

    /// The slice the HTTP layer needs.
    pub fn api_config(&self) -> ApiConfig {
        ApiConfig {
            public_url: self.app.public_url.clone(),
            debug: self.app.debug,
            cors: self.cors.clone(),
            rate_limit: self.rate_limit.clone(),
            timeouts: self.timeouts.clone(),
        }
    }

    pub fn listen_addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.app.host, self.app.port)
            .parse()
            .with_context(|| format!("Invalid listen address {}:{}", self.app.host, self.app.port))
    }
}

fn defaults() -> Result<ConfigBuilder<DefaultState>> {
    Ok(config::Config::builder().add_source(config::Config::try_from(&AppConfig::default())?))
}

/// `TRACKER__DATABASE__HOST` → `database.host`. `source` replaces the
/// process environment (tests).
fn environment(source: Option<HashMap<String, String>>) -> Environment {
    let mut env = Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .list_separator(",")
        .try_parsing(true)
        .source(source);
    for key in LIST_KEYS {
        env = env.with_list_parse_key(key);
    }
    env
}

fn finish(builder: ConfigBuilder<DefaultState>) -> Result<AppConfig> {
    let config: AppConfig = builder
        .build()
        .context("Failed to build configuration")?
        .try_deserialize()
        .context("Failed to deserialize configuration")?;
    config.validate().context("Invalid configuration")?;
    Ok(config)
}

/// Load configuration from the file at `APP_CONFIG` (optional) and the
/// process environment.
pub fn load_config() -> Result<AppConfig> {
    let path =
        std::env::var(CONFIG_PATH_VAR).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    let explicit = std::env::var(CONFIG_PATH_VAR).is_ok();

    let builder = defaults()?
        .add_source(File::new(&path, FileFormat::Yaml).required(explicit))
        .add_source(environment(None));
    finish(builder).with_context(|| format!("Loading configuration (file: {})", path))
}

/// Load from YAML text and an explicit environment map.
pub fn load_from_str(yaml: &str, env: HashMap<String, String>) -> Result<AppConfig> {
    let builder = defaults()?
        .add_source(File::from_str(yaml, FileFormat::Yaml))
        .add_source(environment(Some(env)));
    finish(builder)
}
