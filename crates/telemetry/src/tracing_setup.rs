//! Tracing setup for structured logging.

use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::sync::Mutex;
use thiserror::Error;
use tracing_subscriber::{
    fmt::{self, writer::BoxMakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Logging configuration (`logging.*`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Level or filter directive (e.g. "info", "tracker_api=debug").
    #[serde(default = "default_level")]
    pub level: String,
    /// "json" or "text".
    #[serde(default = "default_format")]
    pub format: String,
    /// "stdout", "stderr", or a file path.
    #[serde(default = "default_output")]
    pub output: String,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_format() -> String {
    "json".to_string()
}

fn default_output() -> String {
    "stdout".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: default_format(),
            output: default_output(),
        }
    }
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

#[derive(Debug, Error)]
pub enum TracingError {
    #[error("cannot open log file {path}: {source}")]
    LogFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("tracing already initialized: {0}")]
    Init(String),
}

fn make_writer(output: &str) -> Result<BoxMakeWriter, TracingError> {
    match output.to_ascii_lowercase().as_str() {
        "" | "stdout" => Ok(BoxMakeWriter::new(std::io::stdout)),
        "stderr" => Ok(BoxMakeWriter::new(std::io::stderr)),
        _ => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(output)
                .map_err(|source| TracingError::LogFile {
                    path: output.to_string(),
                    source,
                })?;
            Ok(BoxMakeWriter::new(Mutex::new(file)))
        }
    }
}

/// Initialize the process-wide subscriber. `RUST_LOG` overrides `level`.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), TracingError> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let writer = make_writer(&config.output)?;
    let to_file = !matches!(config.output.as_str(), "" | "stdout" | "stderr");

    if config.is_json() {
        let fmt_layer = fmt::layer()
            .json()
            .with_writer(writer)
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TracingError::Init(e.to_string()))?;
    } else {
        let fmt_layer = fmt::layer()
            .with_writer(writer)
            .with_ansi(!to_file)
            .with_target(true)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TracingError::Init(e.to_string()))?;
    }

    tracing::info!(
        level = %config.level,
        format = %config.format,
        output = %config.output,
        "Tracing initialized"
    );
    Ok(())
}
