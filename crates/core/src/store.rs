//! Capability traits for persistence.
//!
//! Implementations are injected at composition time: Postgres in
//! production, in-memory doubles in tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::application::Application;
use crate::error::Result;
use crate::event::{TimeRange, TrackingEvent};
use crate::stats::{Statistics, StatsQuery};

/// Outcome of an API-key regeneration.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyRotation {
    pub app_id: String,
    pub old_api_key: String,
    pub new_api_key: String,
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Debug for KeyRotation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyRotation")
            .field("app_id", &self.app_id)
            .field("updated_at", &self.updated_at)
            .finish_non_exhaustive()
    }
}

/// Application repository.
#[async_trait]
pub trait ApplicationStore: Send + Sync {
    /// Insert, assigning `app_id`/`api_key` when empty. `DUPLICATE` on a
    /// unique-key conflict.
    async fn create(&self, app: Application) -> Result<Application>;

    async fn get_by_id(&self, app_id: &str) -> Result<Application>;

    async fn get_by_api_key(&self, api_key: &str) -> Result<Application>;

    /// Persist mutable fields and bump `updated_at`. `NOT_FOUND` if no row.
    async fn update(&self, app: &Application) -> Result<Application>;

    /// `NOT_FOUND` if no row was deleted.
    async fn delete(&self, app_id: &str) -> Result<()>;

    /// Atomically replace the key, returning both old and new values.
    async fn regenerate_api_key(&self, app_id: &str) -> Result<KeyRotation>;

    /// Newest first.
    async fn list(&self, limit: u32, offset: u64) -> Result<Vec<Application>>;

    async fn count(&self) -> Result<u64>;

    /// Cheap reachability probe.
    async fn ping(&self) -> Result<()>;
}

/// Tracking-event repository. Reads are tenant-scoped.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Single-row insert. `DUPLICATE` if the ID already exists.
    async fn create(&self, event: &TrackingEvent) -> Result<()>;

    async fn get_by_id(&self, app_id: &str, id: &str) -> Result<TrackingEvent>;

    /// Newest first.
    async fn get_by_app_id(
        &self,
        app_id: &str,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<TrackingEvent>>;

    /// Oldest first.
    async fn get_by_session_id(&self, app_id: &str, session_id: &str)
        -> Result<Vec<TrackingEvent>>;

    /// Newest first.
    async fn get_by_time_range(
        &self,
        app_id: &str,
        range: TimeRange,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<TrackingEvent>>;

    /// Rows deleted.
    async fn delete_by_app_id(&self, app_id: &str) -> Result<u64>;

    /// Rows deleted.
    async fn delete_by_time_range(&self, app_id: &str, range: TimeRange) -> Result<u64>;

    async fn count_by_app_id(&self, app_id: &str) -> Result<u64>;

    async fn statistics(&self, query: &StatsQuery) -> Result<Statistics>;
}
