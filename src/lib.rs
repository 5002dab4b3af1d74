//! Shared startup code for the `tracker-server` and `tracker-worker`
//! binaries.

pub mod bootstrap;
pub mod config;

pub use bootstrap::{connect_backends, shutdown_signal, Backends};
pub use config::{load_config, AppConfig};
