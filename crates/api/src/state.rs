//! Application state shared across handlers.

use std::sync::Arc;
use tracker_cache::Cache;
use tracker_core::{ApplicationStore, EventStore};

use crate::assets::BeaconAssets;
use crate::config::ApiConfig;
use crate::middleware::rate_limit::RateLimiter;
use crate::services::{ApplicationService, IngestionService, StatisticsService};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub applications: ApplicationService,
    pub ingestion: IngestionService,
    pub statistics: StatisticsService,
    /// Direct event reads and bulk deletes
    pub events: Arc<dyn EventStore>,
    pub cache: Arc<dyn Cache>,
    pub rate_limiter: Arc<RateLimiter>,
    pub assets: Arc<BeaconAssets>,
    pub config: Arc<ApiConfig>,
}

impl AppState {
    pub fn new(
        apps: Arc<dyn ApplicationStore>,
        events: Arc<dyn EventStore>,
        cache: Arc<dyn Cache>,
        config: ApiConfig,
    ) -> Self {
        Self {
            applications: ApplicationService::new(apps, cache.clone()),
            ingestion: IngestionService::new(events.clone()),
            statistics: StatisticsService::new(events.clone(), cache.clone()),
            events,
            rate_limiter: Arc::new(RateLimiter::new(
                cache.clone(),
                config.rate_limit.clone(),
            )),
            cache,
            assets: Arc::new(BeaconAssets::new()),
            config: Arc::new(config),
        }
    }
}
