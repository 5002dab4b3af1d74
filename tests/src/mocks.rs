//! In-memory store doubles implementing the repository traits.
//!
//! Both honour the same contracts as the Postgres stores (tenant scoping,
//! ordering, duplicate detection) and can be switched into a failing mode
//! that answers `STORE_UNAVAILABLE`.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tracker_core::auth::generate_api_key;
use tracker_core::stats::compute_statistics;
use tracker_core::{
    Application, ApplicationStore, Error, EventStore, KeyRotation, Result, Statistics, StatsQuery,
    TimeRange, TrackingEvent,
};

/// Application store backed by a map.
#[derive(Default)]
pub struct MemoryApplicationStore {
    apps: Mutex<HashMap<String, Application>>,
    should_fail: AtomicBool,
    lookups: AtomicUsize,
}

impl MemoryApplicationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_should_fail(&self, should_fail: bool) {
        self.should_fail.store(should_fail, Ordering::SeqCst);
    }

    /// Number of `get_by_id`/`get_by_api_key` calls that reached the store.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }

    /// Insert directly, bypassing validation.
    pub fn insert(&self, app: Application) {
        self.apps.lock().insert(app.app_id.clone(), app);
    }

    fn check(&self) -> Result<()> {
        if self.should_fail.load(Ordering::SeqCst) {
            Err(Error::store("memory store unavailable"))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl ApplicationStore for MemoryApplicationStore {
    async fn create(&self, mut app: Application) -> Result<Application> {
        self.check()?;
        app.assign_identity();
        let mut apps = self.apps.lock();
        if apps.contains_key(&app.app_id) || apps.values().any(|a| a.api_key == app.api_key) {
            return Err(Error::duplicate("application already exists"));
        }
        apps.insert(app.app_id.clone(), app.clone());
        Ok(app)
    }

    async fn get_by_id(&self, app_id: &str) -> Result<Application> {
        self.check()?;
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.apps
            .lock()
            .get(app_id)
            .cloned()
            .ok_or_else(|| Error::not_found("application"))
    }

    async fn get_by_api_key(&self, api_key: &str) -> Result<Application> {
        self.check()?;
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.apps
            .lock()
            .values()
            .find(|a| a.api_key == api_key)
            .cloned()
            .ok_or_else(|| Error::not_found("application"))
    }

    async fn update(&self, app: &Application) -> Result<Application> {
        self.check()?;
        let mut apps = self.apps.lock();
        let stored = apps
            .get_mut(&app.app_id)
            .ok_or_else(|| Error::not_found("application"))?;
        let mut updated = app.clone();
        updated.api_key = stored.api_key.clone();
        updated.created_at = stored.created_at;
        updated.updated_at = Utc::now();
        *stored = updated.clone();
        Ok(updated)
    }

    async fn delete(&self, app_id: &str) -> Result<()> {
        self.check()?;
        self.apps
            .lock()
            .remove(app_id)
            .map(|_| ())
            .ok_or_else(|| Error::not_found("application"))
    }

    async fn regenerate_api_key(&self, app_id: &str) -> Result<KeyRotation> {
        self.check()?;
        let mut apps = self.apps.lock();
        let app = apps
            .get_mut(app_id)
            .ok_or_else(|| Error::not_found("application"))?;
        let old_api_key = std::mem::replace(&mut app.api_key, generate_api_key().into_inner());
        app.updated_at = Utc::now();
        Ok(KeyRotation {
            app_id: app.app_id.clone(),
            old_api_key,
            new_api_key: app.api_key.clone(),
            updated_at: app.updated_at,
        })
    }

    async fn list(&self, limit: u32, offset: u64) -> Result<Vec<Application>> {
        self.check()?;
        let mut apps: Vec<Application> = self.apps.lock().values().cloned().collect();
        apps.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.app_id.cmp(&b.app_id))
        });
        Ok(apps
            .into_iter()
            .skip(offset as usize)
            .take(limit as usize)
            .collect())
    }

    async fn count(&self) -> Result<u64> {
        self.check()?;
        Ok(self.apps.lock().len() as u64)
    }

    async fn ping(&self) -> Result<()> {
        self.check()
    }
}

/// Event store backed by a vector.
#[derive(Default)]
pub struct MemoryEventStore {
    events: Mutex<Vec<TrackingEvent>>,
    should_fail: AtomicBool,
    collisions: AtomicUsize,
    write_delay: Mutex<Option<Duration>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_should_fail(&self, should_fail: bool) {
        self.should_fail.store(should_fail, Ordering::SeqCst);
    }

    /// Answer the next `n` creates with `DUPLICATE`, as an id collision would.
    pub fn collide_next(&self, n: usize) {
        self.collisions.store(n, Ordering::SeqCst);
    }

    /// Stall every create by `delay`.
    pub fn set_write_delay(&self, delay: Option<Duration>) {
        *self.write_delay.lock() = delay;
    }

    /// Insert directly, keeping the event's timestamp.
    pub fn insert(&self, event: TrackingEvent) {
        self.events.lock().push(event);
    }

    pub fn all(&self) -> Vec<TrackingEvent> {
        self.events.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn check(&self) -> Result<()> {
        if self.should_fail.load(Ordering::SeqCst) {
            Err(Error::store("memory store unavailable"))
        } else {
            Ok(())
        }
    }

    fn newest_first(&self, keep: impl Fn(&TrackingEvent) -> bool) -> Vec<TrackingEvent> {
        let mut events: Vec<TrackingEvent> =
            self.events.lock().iter().filter(|e| keep(e)).cloned().collect();
        events.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| b.id.cmp(&a.id)));
        events
    }
}

fn page(events: Vec<TrackingEvent>, limit: u32, offset: u64) -> Vec<TrackingEvent> {
    events
        .into_iter()
        .skip(offset as usize)
        .take(limit as usize)
        .collect()
}

#[async_trait]
impl EventStore for MemoryEventStore {
    async fn create(&self, event: &TrackingEvent) -> Result<()> {
        self.check()?;
        let delay = *self.write_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let collided = self
            .collisions
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if collided {
            return Err(Error::duplicate("event id already exists"));
        }
        let mut events = self.events.lock();
        if events.iter().any(|e| e.id == event.id) {
            return Err(Error::duplicate("event id already exists"));
        }
        events.push(event.clone());
        Ok(())
    }

    async fn get_by_id(&self, app_id: &str, id: &str) -> Result<TrackingEvent> {
        self.check()?;
        self.events
            .lock()
            .iter()
            .find(|e| e.app_id == app_id && e.id == id)
            .cloned()
            .ok_or_else(|| Error::not_found("event"))
    }

    async fn get_by_app_id(
        &self,
        app_id: &str,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<TrackingEvent>> {
        self.check()?;
        Ok(page(self.newest_first(|e| e.app_id == app_id), limit, offset))
    }

    async fn get_by_session_id(
        &self,
        app_id: &str,
        session_id: &str,
    ) -> Result<Vec<TrackingEvent>> {
        self.check()?;
        let mut events = self.newest_first(|e| e.app_id == app_id && e.session_id == session_id);
        events.reverse();
        Ok(events)
    }

    async fn get_by_time_range(
        &self,
        app_id: &str,
        range: TimeRange,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<TrackingEvent>> {
        self.check()?;
        Ok(page(
            self.newest_first(|e| e.app_id == app_id && range.contains(e.timestamp)),
            limit,
            offset,
        ))
    }

    async fn delete_by_app_id(&self, app_id: &str) -> Result<u64> {
        self.check()?;
        let mut events = self.events.lock();
        let before = events.len();
        events.retain(|e| e.app_id != app_id);
        Ok((before - events.len()) as u64)
    }

    async fn delete_by_time_range(&self, app_id: &str, range: TimeRange) -> Result<u64> {
        self.check()?;
        let mut events = self.events.lock();
        let before = events.len();
        events.retain(|e| !(e.app_id == app_id && range.contains(e.timestamp)));
        Ok((before - events.len()) as u64)
    }

    async fn count_by_app_id(&self, app_id: &str) -> Result<u64> {
        self.check()?;
        Ok(self.events.lock().iter().filter(|e| e.app_id == app_id).count() as u64)
    }

    async fn statistics(&self, query: &StatsQuery) -> Result<Statistics> {
        self.check()?;
        Ok(compute_statistics(query, &self.events.lock()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracker_core::{CreateApplication, ErrorCode};

    fn app() -> Application {
        Application::new(CreateApplication {
            name: "Shop".to_string(),
            description: None,
            domain: "shop.example.com".to_string(),
        })
    }

    #[tokio::test]
    async fn test_application_store_roundtrip() {
        let store = MemoryApplicationStore::new();
        let created = store.create(app()).await.unwrap();
        let by_key = store.get_by_api_key(&created.api_key).await.unwrap();
        assert_eq!(by_key.app_id, created.app_id);

        let rotation = store.regenerate_api_key(&created.app_id).await.unwrap();
        assert_ne!(rotation.new_api_key, rotation.old_api_key);
        assert!(store.get_by_api_key(&created.api_key).await.is_err());
    }

    #[tokio::test]
    async fn test_failure_toggle() {
        let store = MemoryEventStore::new();
        store.set_should_fail(true);
        let err = store.count_by_app_id("app_x").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::StoreUnavailable);
    }
}
