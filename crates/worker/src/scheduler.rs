//! Worker scheduler for background tasks.

use std::sync::Arc;
use std::time::Duration;
use telemetry::metrics;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info};

use crate::probes::HealthProbe;
use crate::retention::RetentionWorker;

/// Worker scheduler configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub retention_interval: Duration,
    pub health_interval: Duration,
    pub metrics_log_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            retention_interval: Duration::from_secs(3600),
            health_interval: Duration::from_secs(30),
            metrics_log_interval: Duration::from_secs(60),
        }
    }
}

/// Background worker scheduler.
pub struct WorkerScheduler {
    config: WorkerConfig,
    retention: RetentionWorker,
    probe: HealthProbe,
}

impl WorkerScheduler {
    pub fn new(config: WorkerConfig, retention: RetentionWorker, probe: HealthProbe) -> Self {
        Self {
            config,
            retention,
            probe,
        }
    }

    /// Starts all background workers.
    pub fn start(self: Arc<Self>) -> Vec<tokio::task::JoinHandle<()>> {
        let mut handles = Vec::new();

        if self.retention.config().is_enabled() {
            let scheduler = self.clone();
            handles.push(tokio::spawn(async move {
                scheduler.run_retention().await;
            }));
        } else {
            info!("Retention disabled (retention.days = 0)");
        }

        let scheduler = self.clone();
        handles.push(tokio::spawn(async move {
            scheduler.run_health_probe().await;
        }));

        let scheduler = self.clone();
        handles.push(tokio::spawn(async move {
            scheduler.run_metrics_log().await;
        }));

        info!(workers = handles.len(), "Background workers started");
        handles
    }

    async fn run_retention(&self) {
        let mut ticker = interval(self.config.retention_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            if let Err(e) = self.retention.run().await {
                error!(error = %e, "Retention worker error");
            }
        }
    }

    async fn run_health_probe(&self) {
        let mut ticker = interval(self.config.health_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            self.probe.run().await;
        }
    }

    async fn run_metrics_log(&self) {
        let mut ticker = interval(self.config.metrics_log_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;

            let snapshot = metrics().snapshot();
            info!(
                events_received = snapshot.events_received,
                events_persisted = snapshot.events_persisted,
                events_rejected = snapshot.events_rejected,
                beacon_hits = snapshot.beacon_hits,
                beacon_dropped = snapshot.beacon_dropped,
                rate_limited = snapshot.rate_limited_requests,
                limiter_fail_open = snapshot.rate_limiter_fail_open,
                cache_hits = snapshot.cache_hits,
                cache_misses = snapshot.cache_misses,
                store_errors = snapshot.store_errors,
                retention_deleted = snapshot.retention_deleted,
                ingest_latency_mean_ms = snapshot.ingest_latency_mean_ms,
                "Metrics snapshot"
            );
        }
    }
}
