//! PostgreSQL persistence for applications and tracking events.
//!
//! Queries are built at runtime with `sqlx::query_as`, so the crate
//! compiles without a live database.

pub mod applications;
pub mod client;
pub mod config;
mod error;
pub mod health;
pub mod schema;
mod stats;
pub mod tracking;

pub use applications::PgApplicationStore;
pub use client::StoreClient;
pub use config::DatabaseConfig;
pub use health::{check_connection, init_schema};
pub use tracking::PgEventStore;
