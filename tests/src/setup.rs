//! Common test setup functions.

use axum::Router;
use axum_test::TestServer;
use std::sync::Arc;
use tracker_api::{router, ApiConfig, AppState};
use tracker_cache::MemoryCache;
use tracker_core::{Application, ApplicationStore, EventStore};

use crate::fixtures;
use crate::mocks::{MemoryApplicationStore, MemoryEventStore};

/// Test context: the real router over in-memory stores and cache.
///
/// Everything above the repository traits runs production code: the
/// middleware stages, services, envelope, and the cache client contract.
pub struct TestContext {
    pub apps: Arc<MemoryApplicationStore>,
    pub events: Arc<MemoryEventStore>,
    pub cache: Arc<MemoryCache>,
    pub router: Router,
}

impl TestContext {
    pub fn new() -> Self {
        Self::with_config(ApiConfig::default())
    }

    pub fn with_config(config: ApiConfig) -> Self {
        let apps = Arc::new(MemoryApplicationStore::new());
        let events = Arc::new(MemoryEventStore::new());
        let cache = Arc::new(MemoryCache::new());

        let state = AppState::new(
            apps.clone() as Arc<dyn ApplicationStore>,
            events.clone() as Arc<dyn EventStore>,
            cache.clone(),
            config,
        );

        Self {
            apps,
            events,
            cache,
            router: router(state),
        }
    }

    pub fn server(&self) -> TestServer {
        TestServer::new(self.router.clone()).expect("Failed to create test server")
    }

    /// Register an active application directly in the store.
    pub fn register(&self, name: &str) -> Application {
        let app = fixtures::application(name);
        self.apps.insert(app.clone());
        app
    }

    pub fn register_inactive(&self, name: &str) -> Application {
        let app = fixtures::inactive_application(name);
        self.apps.insert(app.clone());
        app
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
