//! Statistics query parsing and rollup helpers.
//!
//! The Postgres store computes rollups in SQL; the helpers here define the
//! ordering and bucketing rules both it and in-memory stores follow.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::event::{TimeRange, TrackingEvent};
use crate::limits::{DEFAULT_TOP_N, MAX_STATS_PERIOD_DAYS, MAX_TOP_N};

/// Time-series granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    Hour,
    #[default]
    Day,
}

impl GroupBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hour => "hour",
            Self::Day => "day",
        }
    }

    pub fn step_secs(&self) -> i64 {
        match self {
            Self::Hour => 3_600,
            Self::Day => 86_400,
        }
    }

    /// Start of the UTC bucket containing `ts`.
    pub fn bucket_start(&self, ts: DateTime<Utc>) -> DateTime<Utc> {
        let secs = ts.timestamp();
        let floored = secs - secs.rem_euclid(self.step_secs());
        DateTime::from_timestamp(floored, 0).unwrap_or(ts)
    }
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GroupBy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hour" => Ok(Self::Hour),
            "day" => Ok(Self::Day),
            other => Err(Error::validation(format!(
                "group_by must be 'hour' or 'day', got '{}'",
                other
            ))),
        }
    }
}

/// A fully resolved statistics request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsQuery {
    pub app_id: String,
    pub range: TimeRange,
    pub group_by: GroupBy,
    pub limit: u32,
    /// Bounds as the caller wrote them, echoed back and used in cache keys.
    pub start_label: String,
    pub end_label: String,
}

impl StatsQuery {
    /// Parse query-string values.
    ///
    /// Dates are `YYYY-MM-DD` (a whole UTC day, end day inclusive) or
    /// RFC 3339 instants (end instant inclusive). Missing bounds default to
    /// the last seven days ending today.
    pub fn parse(
        app_id: &str,
        start_date: Option<&str>,
        end_date: Option<&str>,
        group_by: Option<&str>,
        limit: Option<u32>,
    ) -> Result<Self> {
        let today = Utc::now().date_naive();
        let end_label = end_date
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| today.to_string());
        let start_label = start_date
            .filter(|s| !s.trim().is_empty())
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|| (today - Duration::days(6)).to_string());

        let TimeRange { start, end } = parse_range(&start_label, &end_label)?;

        if end - start > Duration::days(MAX_STATS_PERIOD_DAYS) {
            return Err(Error::validation_with_details(
                "Invalid period",
                vec![format!(
                    "period must not exceed {} days",
                    MAX_STATS_PERIOD_DAYS
                )],
            ));
        }

        let group_by = match group_by.filter(|s| !s.trim().is_empty()) {
            Some(raw) => raw.parse()?,
            None => GroupBy::default(),
        };

        let limit = match limit {
            None => DEFAULT_TOP_N,
            Some(0) => {
                return Err(Error::validation("limit must be at least 1"));
            }
            Some(n) => n.min(MAX_TOP_N),
        };

        Ok(Self {
            app_id: app_id.to_string(),
            range: TimeRange { start, end },
            group_by,
            limit,
            start_label,
            end_label,
        })
    }
}

/// Parse a `start_date`/`end_date` pair into a half-open range, with the
/// same date rules as statistics queries.
pub fn parse_range(start_date: &str, end_date: &str) -> Result<TimeRange> {
    let start = parse_bound(start_date.trim(), Bound::Start)?;
    let end = parse_bound(end_date.trim(), Bound::End)?;

    if start >= end {
        return Err(Error::validation_with_details(
            "Invalid period",
            vec!["start_date must not be after end_date".to_string()],
        ));
    }
    Ok(TimeRange { start, end })
}

#[derive(Clone, Copy)]
enum Bound {
    Start,
    End,
}

fn parse_bound(raw: &str, bound: Bound) -> Result<DateTime<Utc>> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        let day = match bound {
            Bound::Start => date,
            Bound::End => date
                .succ_opt()
                .ok_or_else(|| Error::validation("end_date out of range"))?,
        };
        return Ok(day.and_time(NaiveTime::MIN).and_utc());
    }

    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => {
            let ts = ts.with_timezone(&Utc);
            Ok(match bound {
                Bound::Start => ts,
                // inclusive end instant; the store keeps microseconds
                Bound::End => ts + Duration::microseconds(1),
            })
        }
        Err(_) => {
            let field = match bound {
                Bound::Start => "start_date",
                Bound::End => "end_date",
            };
            Err(Error::validation_with_details(
                "Invalid date",
                vec![format!("{}: expected YYYY-MM-DD or RFC 3339, got '{}'", field, raw)],
            ))
        }
    }
}

/// One entry of a top-N list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopItem {
    pub value: String,
    pub count: u64,
}

/// One time-series bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBucket {
    pub bucket: DateTime<Utc>,
    pub count: u64,
}

/// Aggregated statistics for one tenant over one period.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub app_id: String,
    pub start_date: String,
    pub end_date: String,
    pub group_by: GroupBy,
    pub total_requests: u64,
    pub unique_visitors: u64,
    pub unique_sessions: u64,
    /// Seconds.
    pub average_session_duration: f64,
    pub top_pages: Vec<TopItem>,
    pub top_referrers: Vec<TopItem>,
    pub top_user_agents: Vec<TopItem>,
    pub top_countries: Vec<TopItem>,
    pub time_series: Vec<TimeBucket>,
}

impl Statistics {
    /// All-zero statistics with a zero-filled series.
    pub fn empty(query: &StatsQuery) -> Self {
        Self {
            app_id: query.app_id.clone(),
            start_date: query.start_label.clone(),
            end_date: query.end_label.clone(),
            group_by: query.group_by,
            total_requests: 0,
            unique_visitors: 0,
            unique_sessions: 0,
            average_session_duration: 0.0,
            top_pages: Vec::new(),
            top_referrers: Vec::new(),
            top_user_agents: Vec::new(),
            top_countries: Vec::new(),
            time_series: fill_time_series(&query.range, query.group_by, &[]),
        }
    }
}

/// Order by count descending, ties by value ascending, then truncate.
pub fn rank_top(counts: impl IntoIterator<Item = (String, u64)>, limit: u32) -> Vec<TopItem> {
    let mut items: Vec<TopItem> = counts
        .into_iter()
        .map(|(value, count)| TopItem { value, count })
        .collect();
    items.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.value.cmp(&b.value)));
    items.truncate(limit as usize);
    items
}

/// Expand sparse bucket counts into a dense series covering `range`.
pub fn fill_time_series(
    range: &TimeRange,
    group_by: GroupBy,
    counts: &[(DateTime<Utc>, u64)],
) -> Vec<TimeBucket> {
    let by_bucket: HashMap<DateTime<Utc>, u64> = counts
        .iter()
        .map(|(ts, n)| (group_by.bucket_start(*ts), *n))
        .fold(HashMap::new(), |mut acc, (ts, n)| {
            *acc.entry(ts).or_insert(0) += n;
            acc
        });

    let step = Duration::seconds(group_by.step_secs());
    let mut series = Vec::new();
    let mut cursor = group_by.bucket_start(range.start);
    while cursor < range.end {
        series.push(TimeBucket {
            bucket: cursor,
            count: by_bucket.get(&cursor).copied().unwrap_or(0),
        });
        cursor += step;
    }
    series
}

/// Mean of per-session spans in seconds. Single-event sessions span 0.
pub fn average_session_duration(
    spans: impl IntoIterator<Item = (DateTime<Utc>, DateTime<Utc>)>,
) -> f64 {
    let (total, sessions) = spans.into_iter().fold((0i64, 0u64), |(sum, n), (first, last)| {
        (sum + (last - first).num_milliseconds().max(0), n + 1)
    });
    if sessions == 0 {
        0.0
    } else {
        total as f64 / 1000.0 / sessions as f64
    }
}

/// Compute statistics over events already loaded in memory.
///
/// Events outside the query's tenant or range are ignored.
pub fn compute_statistics(query: &StatsQuery, events: &[TrackingEvent]) -> Statistics {
    let in_range: Vec<&TrackingEvent> = events
        .iter()
        .filter(|e| e.app_id == query.app_id && query.range.contains(e.timestamp))
        .collect();

    let mut stats = Statistics::empty(query);
    if in_range.is_empty() {
        return stats;
    }

    let mut pages: HashMap<String, u64> = HashMap::new();
    let mut referrers: HashMap<String, u64> = HashMap::new();
    let mut user_agents: HashMap<String, u64> = HashMap::new();
    let mut countries: HashMap<String, u64> = HashMap::new();
    let mut visitors: HashSet<&str> = HashSet::new();
    let mut sessions: BTreeMap<&str, (DateTime<Utc>, DateTime<Utc>)> = BTreeMap::new();
    let mut buckets: HashMap<DateTime<Utc>, u64> = HashMap::new();

    for event in &in_range {
        if !event.page_url.is_empty() {
            *pages.entry(event.page_url.clone()).or_insert(0) += 1;
        }
        if let Some(ref referrer) = event.referrer {
            *referrers.entry(referrer.clone()).or_insert(0) += 1;
        }
        if !event.user_agent.is_empty() {
            *user_agents.entry(event.user_agent.clone()).or_insert(0) += 1;
        }
        if let Some(ref country) = event.country {
            *countries.entry(country.clone()).or_insert(0) += 1;
        }
        if !event.visitor_id.is_empty() {
            visitors.insert(event.visitor_id.as_str());
        }
        if !event.session_id.is_empty() {
            let span = sessions
                .entry(event.session_id.as_str())
                .or_insert((event.timestamp, event.timestamp));
            span.0 = span.0.min(event.timestamp);
            span.1 = span.1.max(event.timestamp);
        }
        *buckets
            .entry(query.group_by.bucket_start(event.timestamp))
            .or_insert(0) += 1;
    }

    let bucket_counts: Vec<(DateTime<Utc>, u64)> = buckets.into_iter().collect();

    stats.total_requests = in_range.len() as u64;
    stats.unique_visitors = visitors.len() as u64;
    stats.unique_sessions = sessions.len() as u64;
    stats.average_session_duration = average_session_duration(sessions.into_values());
    stats.top_pages = rank_top(pages, query.limit);
    stats.top_referrers = rank_top(referrers, query.limit);
    stats.top_user_agents = rank_top(user_agents, query.limit);
    stats.top_countries = rank_top(countries, query.limit);
    stats.time_series = fill_time_series(&query.range, query.group_by, &bucket_counts);
    stats
}
