//! Retention worker.
//!
//! Walks every application page by page and deletes its events older than
//! the cutoff with one ranged delete each. A failing application is logged
//! and skipped; the pass continues.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use telemetry::metrics;
use tracing::{debug, info, warn};
use tracker_core::{ApplicationStore, Deadline, EventStore, Result, TimeRange};

/// Applications fetched per listing page.
const APP_PAGE_SIZE: u32 = 100;

/// Default bound on a single application's delete.
const DEFAULT_DELETE_BUDGET: std::time::Duration = std::time::Duration::from_secs(10);

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetentionConfig {
    /// Keep events this many days. `0` disables retention.
    #[serde(default = "default_days")]
    pub days: u32,
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

fn default_days() -> u32 {
    365
}

fn default_interval_secs() -> u64 {
    3600
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            days: default_days(),
            interval_secs: default_interval_secs(),
        }
    }
}

impl RetentionConfig {
    pub fn is_enabled(&self) -> bool {
        self.days > 0
    }

    pub fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.interval_secs.max(1))
    }
}

/// Outcome of one retention pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetentionReport {
    pub applications: u64,
    pub deleted: u64,
    pub failures: u64,
}

/// Everything strictly before `now - days`.
pub fn expired_range(now: DateTime<Utc>, days: u32) -> TimeRange {
    TimeRange {
        start: DateTime::<Utc>::UNIX_EPOCH,
        end: now - Duration::days(i64::from(days)),
    }
}

pub struct RetentionWorker {
    apps: Arc<dyn ApplicationStore>,
    events: Arc<dyn EventStore>,
    config: RetentionConfig,
    delete_budget: std::time::Duration,
}

impl RetentionWorker {
    pub fn new(
        apps: Arc<dyn ApplicationStore>,
        events: Arc<dyn EventStore>,
        config: RetentionConfig,
    ) -> Self {
        Self {
            apps,
            events,
            config,
            delete_budget: DEFAULT_DELETE_BUDGET,
        }
    }

    /// Bound each per-application delete (`timeouts.store_secs`).
    pub fn with_delete_budget(mut self, budget: std::time::Duration) -> Self {
        self.delete_budget = budget;
        self
    }

    pub fn config(&self) -> &RetentionConfig {
        &self.config
    }

    /// One pass over all applications. Fails only if listing fails.
    pub async fn run(&self) -> Result<RetentionReport> {
        let mut report = RetentionReport::default();
        if !self.config.is_enabled() {
            debug!("Retention disabled");
            return Ok(report);
        }

        let range = expired_range(Utc::now(), self.config.days);
        info!(cutoff = %range.end, days = self.config.days, "Running retention pass");

        let mut offset = 0u64;
        loop {
            let page = self.apps.list(APP_PAGE_SIZE, offset).await?;
            let fetched = page.len();

            for app in page {
                report.applications += 1;
                let delete = self.events.delete_by_time_range(&app.app_id, range);
                match Deadline::after(self.delete_budget).run(delete).await {
                    Ok(0) => {}
                    Ok(deleted) => {
                        debug!(app_id = %app.app_id, deleted = deleted, "Expired events deleted");
                        report.deleted += deleted;
                    }
                    Err(e) => {
                        warn!(app_id = %app.app_id, error = %e, "Retention delete failed");
                        report.failures += 1;
                    }
                }
            }

            if fetched < APP_PAGE_SIZE as usize {
                break;
            }
            offset += fetched as u64;
        }

        metrics().retention_deleted.inc_by(report.deleted);
        info!(
            applications = report.applications,
            deleted = report.deleted,
            failures = report.failures,
            "Retention pass complete"
        );
        Ok(report)
    }
}
