//! Application lifecycle with a cache-through read path.
//!
//! Reads probe the cache first and populate it on a miss. Writes go to the
//! store, then invalidate `app:by_id:<id>` and `app:by_api_key:<old key>`
//! in that order. Cache failures never fail the call.

use std::sync::Arc;
use std::time::Duration;
use telemetry::metrics;
use tracing::{debug, info, warn};
use tracker_cache::{keys, Cache, CacheExt};
use tracker_core::limits::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT};
use tracker_core::{
    ApiKey, Application, ApplicationStore, CreateApplication, Error, ErrorCode, KeyRotation,
    Result, UpdateApplication,
};

use super::Page;

/// Snapshot lifetime for cached applications.
pub const APP_CACHE_TTL: Duration = Duration::from_secs(300);

#[derive(Clone)]
pub struct ApplicationService {
    store: Arc<dyn ApplicationStore>,
    cache: Arc<dyn Cache>,
    ttl: Duration,
}

impl ApplicationService {
    pub fn new(store: Arc<dyn ApplicationStore>, cache: Arc<dyn Cache>) -> Self {
        Self {
            store,
            cache,
            ttl: APP_CACHE_TTL,
        }
    }

    pub fn store(&self) -> &Arc<dyn ApplicationStore> {
        &self.store
    }

    pub async fn create(&self, request: CreateApplication) -> Result<Application> {
        request.check()?;
        let app = self.store.create(Application::new(request)).await?;
        info!(app_id = %app.app_id, domain = %app.domain, "Application registered");
        Ok(app)
    }

    pub async fn get(&self, app_id: &str) -> Result<Application> {
        let key = keys::app_by_id(app_id);
        if let Some(app) = self.cached(&key).await {
            return Ok(app);
        }
        let app = self.store.get_by_id(app_id).await?;
        self.populate(&key, &app).await;
        Ok(app)
    }

    pub async fn get_by_api_key(&self, api_key: &ApiKey) -> Result<Application> {
        let key = keys::app_by_api_key(api_key.expose());
        if let Some(app) = self.cached(&key).await {
            return Ok(app);
        }
        let app = self.store.get_by_api_key(api_key.expose()).await?;
        self.populate(&key, &app).await;
        Ok(app)
    }

    /// Resolve a presented key to an active application.
    pub async fn authenticate(&self, api_key: &ApiKey) -> Result<Application> {
        let app = match self.get_by_api_key(api_key).await {
            Ok(app) => app,
            Err(e) if e.code() == ErrorCode::NotFound => {
                debug!(api_key = %api_key, "Unknown API key");
                return Err(Error::InvalidApiKey);
            }
            Err(e) => return Err(e),
        };
        app.ensure_active()?;
        Ok(app)
    }

    /// Newest first. `page` is 1-based.
    pub async fn list(&self, page: Option<u64>, limit: Option<u32>) -> Result<Page<Application>> {
        let page = page.unwrap_or(1).max(1);
        let limit = limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT);
        let offset = (page - 1).saturating_mul(u64::from(limit));

        let apps = self.store.list(limit, offset).await?;
        let total = self.store.count().await?;
        Ok(Page {
            items: apps,
            page,
            limit,
            total,
        })
    }

    pub async fn update(&self, app_id: &str, update: UpdateApplication) -> Result<Application> {
        update.check()?;
        if update.is_empty() {
            return Err(Error::validation("At least one field must be provided"));
        }

        let mut app = self.store.get_by_id(app_id).await?;
        let old_key = app.api_key.clone();
        update.apply_to(&mut app);
        let app = self.store.update(&app).await?;

        self.invalidate(app_id, &old_key).await;
        info!(app_id = %app_id, active = app.active, "Application updated");
        Ok(app)
    }

    pub async fn delete(&self, app_id: &str) -> Result<()> {
        let app = self.store.get_by_id(app_id).await?;
        self.store.delete(app_id).await?;

        self.invalidate(app_id, &app.api_key).await;
        info!(app_id = %app_id, "Application deleted");
        Ok(())
    }

    pub async fn regenerate_api_key(&self, app_id: &str) -> Result<KeyRotation> {
        let rotation = self.store.regenerate_api_key(app_id).await?;

        self.invalidate(app_id, &rotation.old_api_key).await;
        info!(app_id = %app_id, "API key regenerated");
        Ok(rotation)
    }

    async fn cached(&self, key: &str) -> Option<Application> {
        match self.cache.get_json::<Application>(key).await {
            Ok(Some(app)) => {
                metrics().cache_hits.inc();
                Some(app)
            }
            Ok(None) => {
                metrics().cache_misses.inc();
                None
            }
            Err(e) => {
                warn!(error = %e, "Application cache read failed, using store");
                metrics().cache_errors.inc();
                None
            }
        }
    }

    async fn populate(&self, key: &str, app: &Application) {
        if let Err(e) = self.cache.set_json(key, app, Some(self.ttl)).await {
            warn!(error = %e, app_id = %app.app_id, "Application cache write failed");
            metrics().cache_errors.inc();
        }
    }

    async fn invalidate(&self, app_id: &str, api_key: &str) {
        for key in [keys::app_by_id(app_id), keys::app_by_api_key(api_key)] {
            if let Err(e) = self.cache.delete(&key).await {
                warn!(error = %e, app_id = %app_id, "Application cache invalidation failed");
                metrics().cache_errors.inc();
            }
        }
    }
}
