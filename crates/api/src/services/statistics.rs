//! Statistics with a short-lived cache in front of the store.

use std::sync::Arc;
use std::time::{Duration, Instant};
use telemetry::metrics;
use tracing::{debug, warn};
use tracker_cache::{keys, Cache, CacheExt};
use tracker_core::{EventStore, Result, Statistics, StatsQuery};

/// Lifetime of a cached statistics block.
pub const STATS_CACHE_TTL: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct StatisticsService {
    events: Arc<dyn EventStore>,
    cache: Arc<dyn Cache>,
    ttl: Duration,
}

impl StatisticsService {
    pub fn new(events: Arc<dyn EventStore>, cache: Arc<dyn Cache>) -> Self {
        Self {
            events,
            cache,
            ttl: STATS_CACHE_TTL,
        }
    }

    /// Cached rollup for `query`. A failing cache degrades to a store read.
    pub async fn get(&self, query: &StatsQuery) -> Result<Statistics> {
        let key = keys::stats(
            &query.app_id,
            &query.start_label,
            &query.end_label,
            query.group_by.as_str(),
            query.limit,
        );

        match self.cache.get_json::<Statistics>(&key).await {
            Ok(Some(stats)) => {
                metrics().cache_hits.inc();
                debug!(app_id = %query.app_id, "Statistics cache hit");
                return Ok(stats);
            }
            Ok(None) => metrics().cache_misses.inc(),
            Err(e) => {
                warn!(error = %e, app_id = %query.app_id, "Statistics cache read failed, using store");
                metrics().cache_errors.inc();
            }
        }

        let started = Instant::now();
        let stats = self.events.statistics(query).await?;
        metrics()
            .stats_latency_ms
            .observe(started.elapsed().as_millis() as u64);

        if let Err(e) = self.cache.set_json(&key, &stats, Some(self.ttl)).await {
            warn!(error = %e, app_id = %query.app_id, "Statistics cache write failed");
            metrics().cache_errors.inc();
        }
        Ok(stats)
    }
}
