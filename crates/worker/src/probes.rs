//! Reachability probes feeding the process health registry.

use std::sync::Arc;
use std::time::Duration;
use telemetry::health;
use tracing::{info, warn};
use tracker_cache::Cache;
use tracker_core::{ApplicationStore, Deadline, Error};

pub struct HealthProbe {
    apps: Arc<dyn ApplicationStore>,
    cache: Arc<dyn Cache>,
    timeout: Duration,
}

impl HealthProbe {
    pub fn new(apps: Arc<dyn ApplicationStore>, cache: Arc<dyn Cache>, timeout: Duration) -> Self {
        Self {
            apps,
            cache,
            timeout,
        }
    }

    /// Probe both stores and record the results. Logs only on transitions.
    pub async fn run(&self) {
        let was_postgres = health().postgres.is_healthy();
        let was_redis = health().redis.is_healthy();

        let postgres = Deadline::after(self.timeout).run(self.apps.ping()).await;
        let redis = Deadline::after(self.timeout)
            .run(async {
                self.cache
                    .ping()
                    .await
                    .map_err(|e| Error::cache(e.to_string()))
            })
            .await;

        health().postgres.record(&postgres);
        health().redis.record(&redis);

        log_transition("postgres", was_postgres, &postgres);
        log_transition("redis", was_redis, &redis);
    }
}

fn log_transition(component: &str, was_healthy: bool, result: &Result<(), Error>) {
    match (was_healthy, result) {
        (false, Ok(())) => info!(component = component, "Connection: healthy"),
        (true, Err(e)) => warn!(component = component, error = %e, "Connection: unhealthy"),
        _ => {}
    }
}
