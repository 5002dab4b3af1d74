//! Statistics rollups computed in SQL.
//!
//! Each figure is its own query over `(app_id, timestamp)`; they run
//! concurrently on the pool and are assembled into one `Statistics`.

use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::PgPool;
use tracker_core::stats::{fill_time_series, TopItem};
use tracker_core::{Result, Statistics, StatsQuery};

use crate::error::db_error;

/// Columns a top-N list may group by. Only these names reach the SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dimension {
    Page,
    Referrer,
    UserAgent,
    Country,
}

impl Dimension {
    fn column(&self) -> &'static str {
        match self {
            Dimension::Page => "page_url",
            Dimension::Referrer => "referrer",
            Dimension::UserAgent => "user_agent",
            Dimension::Country => "country",
        }
    }
}

pub(crate) async fn compute(pool: &PgPool, query: &StatsQuery) -> Result<Statistics> {

    let (
        (total, visitors, sessions),
        avg_duration,
        top_pages,
        top_referrers,
        top_user_agents,
        top_countries,
        buckets,
    ) = tokio::try_join!(
        summary(pool, query),
        average_duration(pool, query),
        top_n(pool, query, Dimension::Page),
        top_n(pool, query, Dimension::Referrer),
        top_n(pool, query, Dimension::UserAgent),
        top_n(pool, query, Dimension::Country),
        series(pool, query),
    )?;

    let mut stats = Statistics::empty(query);
    stats.total_requests = total;
    stats.unique_visitors = visitors;
    stats.unique_sessions = sessions;
    stats.average_session_duration = avg_duration;
    stats.top_pages = top_pages;
    stats.top_referrers = top_referrers;
    stats.top_user_agents = top_user_agents;
    stats.top_countries = top_countries;
    stats.time_series = fill_time_series(&query.range, query.group_by, &buckets);
    Ok(stats)
}

fn to_count(n: i64) -> u64 {
    n.max(0) as u64
}

async fn summary(pool: &PgPool, query: &StatsQuery) -> Result<(u64, u64, u64)> {
    let (total, visitors, sessions): (i64, i64, i64) = sqlx::query_as(
        "SELECT COUNT(*), \
                COUNT(DISTINCT NULLIF(visitor_id, '')), \
                COUNT(DISTINCT NULLIF(session_id, '')) \
         FROM tracking WHERE app_id = $1 AND timestamp >= $2 AND timestamp < $3",
    )
    .bind(&query.app_id)
    .bind(query.range.start)
    .bind(query.range.end)
    .fetch_one(pool)
    .await
    .map_err(|e| db_error(e, "statistics"))?;

    Ok((to_count(total), to_count(visitors), to_count(sessions)))
}

async fn average_duration(pool: &PgPool, query: &StatsQuery) -> Result<f64> {
    let avg: f64 = sqlx::query_scalar(
        "SELECT COALESCE(AVG(EXTRACT(EPOCH FROM (last_seen - first_seen))), 0)::float8 \
         FROM ( \
             SELECT MIN(timestamp) AS first_seen, MAX(timestamp) AS last_seen \
             FROM tracking \
             WHERE app_id = $1 AND timestamp >= $2 AND timestamp < $3 AND session_id <> '' \
             GROUP BY session_id \
         ) spans",
    )
    .bind(&query.app_id)
    .bind(query.range.start)
    .bind(query.range.end)
    .fetch_one(pool)
    .await
    .map_err(|e| db_error(e, "statistics"))?;

    Ok(avg)
}

async fn top_n(pool: &PgPool, query: &StatsQuery, dimension: Dimension) -> Result<Vec<TopItem>> {
    let column = dimension.column();
    let sql = format!(
        "SELECT {col} AS value, COUNT(*) AS count FROM tracking \
         WHERE app_id = $1 AND timestamp >= $2 AND timestamp < $3 \
           AND {col} IS NOT NULL AND {col} <> '' \
         GROUP BY {col} \
         ORDER BY count DESC, value COLLATE \"C\" ASC \
         LIMIT $4",
        col = column
    );

    let rows: Vec<(String, i64)> = sqlx::query_as(&sql)
        .bind(&query.app_id)
        .bind(query.range.start)
        .bind(query.range.end)
        .bind(i64::from(query.limit))
        .fetch_all(pool)
        .await
        .map_err(|e| db_error(e, "statistics"))?;

    Ok(rows
        .into_iter()
        .map(|(value, count)| TopItem {
            value,
            count: to_count(count),
        })
        .collect())
}

async fn series(pool: &PgPool, query: &StatsQuery) -> Result<Vec<(DateTime<Utc>, u64)>> {
    let rows: Vec<(NaiveDateTime, i64)> = sqlx::query_as(
        "SELECT date_trunc($4::text, timestamp AT TIME ZONE 'UTC') AS bucket, COUNT(*) \
         FROM tracking \
         WHERE app_id = $1 AND timestamp >= $2 AND timestamp < $3 \
         GROUP BY bucket ORDER BY bucket",
    )
    .bind(&query.app_id)
    .bind(query.range.start)
    .bind(query.range.end)
    .bind(query.group_by.as_str())
    .fetch_all(pool)
    .await
    .map_err(|e| db_error(e, "statistics"))?;

    Ok(rows
        .into_iter()
        .map(|(bucket, count)| (bucket.and_utc(), to_count(count)))
        .collect())
}
