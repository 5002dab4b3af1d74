//! Event repository backed by the `tracking` table.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::FromRow;
use tracing::{debug, info};
use tracker_core::{
    CustomParameters, EventStore, Result, Statistics, StatsQuery, TimeRange, TrackingEvent,
};

use crate::client::StoreClient;
use crate::error::db_error;
use crate::stats;

/// Session timelines are capped; a runaway session cannot flood a response.
pub const MAX_SESSION_EVENTS: i64 = 1000;

const EVENT_COLUMNS: &str = "id, app_id, session_id, visitor_id, page_url, page_title, referrer, \
     user_agent, ip_address, country, region, city, device_type, browser, os, language, timezone, \
     custom_parameters::text AS custom_parameters, timestamp, created_at";

#[derive(FromRow)]
struct EventRow {
    id: String,
    app_id: String,
    session_id: String,
    visitor_id: String,
    page_url: String,
    page_title: Option<String>,
    referrer: Option<String>,
    user_agent: String,
    ip_address: String,
    country: Option<String>,
    region: Option<String>,
    city: Option<String>,
    device_type: Option<String>,
    browser: Option<String>,
    os: Option<String>,
    language: Option<String>,
    timezone: Option<String>,
    custom_parameters: String,
    timestamp: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl TryFrom<EventRow> for TrackingEvent {
    type Error = tracker_core::Error;

    fn try_from(row: EventRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            app_id: row.app_id,
            session_id: row.session_id,
            visitor_id: row.visitor_id,
            page_url: row.page_url,
            page_title: row.page_title,
            referrer: row.referrer,
            user_agent: row.user_agent,
            ip_address: row.ip_address,
            country: row.country,
            region: row.region,
            city: row.city,
            device_type: row.device_type,
            browser: row.browser,
            os: row.os,
            language: row.language,
            timezone: row.timezone,
            custom_parameters: CustomParameters::from_json(row.custom_parameters)?,
            timestamp: row.timestamp,
            created_at: row.created_at,
        })
    }
}

fn into_events(rows: Vec<EventRow>) -> Result<Vec<TrackingEvent>> {
    rows.into_iter().map(TrackingEvent::try_from).collect()
}

fn offset_param(offset: u64) -> i64 {
    i64::try_from(offset).unwrap_or(i64::MAX)
}

pub struct PgEventStore {
    client: StoreClient,
}

impl PgEventStore {
    pub fn new(client: StoreClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn create(&self, event: &TrackingEvent) -> Result<()> {
        sqlx::query(
            "INSERT INTO tracking (id, app_id, session_id, visitor_id, page_url, page_title, \
             referrer, user_agent, ip_address, country, region, city, device_type, browser, os, \
             language, timezone, custom_parameters, timestamp, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, \
             $18::jsonb, $19, $20)",
        )
        .bind(&event.id)
        .bind(&event.app_id)
        .bind(&event.session_id)
        .bind(&event.visitor_id)
        .bind(&event.page_url)
        .bind(&event.page_title)
        .bind(&event.referrer)
        .bind(&event.user_agent)
        .bind(&event.ip_address)
        .bind(&event.country)
        .bind(&event.region)
        .bind(&event.city)
        .bind(&event.device_type)
        .bind(&event.browser)
        .bind(&event.os)
        .bind(&event.language)
        .bind(&event.timezone)
        .bind(event.custom_parameters.as_str())
        .bind(event.timestamp)
        .bind(event.created_at)
        .execute(self.client.pool())
        .await
        .map_err(|e| db_error(e, "event"))?;

        debug!(id = %event.id, app_id = %event.app_id, "Stored tracking event");
        Ok(())
    }

    async fn get_by_id(&self, app_id: &str, id: &str) -> Result<TrackingEvent> {
        let sql = format!(
            "SELECT {} FROM tracking WHERE app_id = $1 AND id = $2",
            EVENT_COLUMNS
        );
        let row: EventRow = sqlx::query_as(&sql)
            .bind(app_id)
            .bind(id)
            .fetch_one(self.client.pool())
            .await
            .map_err(|e| db_error(e, "event"))?;
        row.try_into()
    }

    async fn get_by_app_id(
        &self,
        app_id: &str,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<TrackingEvent>> {
        let sql = format!(
            "SELECT {} FROM tracking WHERE app_id = $1 \
             ORDER BY timestamp DESC, id DESC LIMIT $2 OFFSET $3",
            EVENT_COLUMNS
        );
        let rows: Vec<EventRow> = sqlx::query_as(&sql)
            .bind(app_id)
            .bind(i64::from(limit))
            .bind(offset_param(offset))
            .fetch_all(self.client.pool())
            .await
            .map_err(|e| db_error(e, "event"))?;
        into_events(rows)
    }

    async fn get_by_session_id(
        &self,
        app_id: &str,
        session_id: &str,
    ) -> Result<Vec<TrackingEvent>> {
        let sql = format!(
            "SELECT {} FROM tracking WHERE app_id = $1 AND session_id = $2 \
             ORDER BY timestamp ASC, id ASC LIMIT $3",
            EVENT_COLUMNS
        );
        let rows: Vec<EventRow> = sqlx::query_as(&sql)
            .bind(app_id)
            .bind(session_id)
            .bind(MAX_SESSION_EVENTS)
            .fetch_all(self.client.pool())
            .await
            .map_err(|e| db_error(e, "event"))?;
        into_events(rows)
    }

    async fn get_by_time_range(
        &self,
        app_id: &str,
        range: TimeRange,
        limit: u32,
        offset: u64,
    ) -> Result<Vec<TrackingEvent>> {
        let sql = format!(
            "SELECT {} FROM tracking WHERE app_id = $1 AND timestamp >= $2 AND timestamp < $3 \
             ORDER BY timestamp DESC, id DESC LIMIT $4 OFFSET $5",
            EVENT_COLUMNS
        );
        let rows: Vec<EventRow> = sqlx::query_as(&sql)
            .bind(app_id)
            .bind(range.start)
            .bind(range.end)
            .bind(i64::from(limit))
            .bind(offset_param(offset))
            .fetch_all(self.client.pool())
            .await
            .map_err(|e| db_error(e, "event"))?;
        into_events(rows)
    }

    async fn delete_by_app_id(&self, app_id: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM tracking WHERE app_id = $1")
            .bind(app_id)
            .execute(self.client.pool())
            .await
            .map_err(|e| db_error(e, "event"))?;

        info!(app_id = %app_id, deleted = result.rows_affected(), "Deleted tracking events");
        Ok(result.rows_affected())
    }

    async fn delete_by_time_range(&self, app_id: &str, range: TimeRange) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM tracking WHERE app_id = $1 AND timestamp >= $2 AND timestamp < $3",
        )
        .bind(app_id)
        .bind(range.start)
        .bind(range.end)
        .execute(self.client.pool())
        .await
        .map_err(|e| db_error(e, "event"))?;

        info!(
            app_id = %app_id,
            start = %range.start,
            end = %range.end,
            deleted = result.rows_affected(),
            "Deleted tracking events in range"
        );
        Ok(result.rows_affected())
    }

    async fn count_by_app_id(&self, app_id: &str) -> Result<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tracking WHERE app_id = $1")
            .bind(app_id)
            .fetch_one(self.client.pool())
            .await
            .map_err(|e| db_error(e, "event"))?;
        Ok(count.max(0) as u64)
    }

    async fn statistics(&self, query: &StatsQuery) -> Result<Statistics> {
        stats::compute(self.client.pool(), query).await
    }
}
