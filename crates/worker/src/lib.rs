//! Background jobs for the web tracker.
//!
//! - Retention (deletes events past the configured age, per application)
//! - Health probes (Postgres and Redis reachability)
//! - Metrics log (periodic counter snapshot)

pub mod probes;
pub mod retention;
pub mod scheduler;

pub use probes::HealthProbe;
pub use retention::{RetentionConfig, RetentionReport, RetentionWorker};
pub use scheduler::{WorkerConfig, WorkerScheduler};
