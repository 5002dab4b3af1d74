//! Tracking endpoints: event ingestion, statistics, and tenant-scoped
//! event reads.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::HeaderMap,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use tracker_core::limits::{DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT, MAX_TRACK_BODY_BYTES};
use tracker_core::stats::parse_range;
use tracker_core::{Error, Statistics, StatsQuery, TimeRange, TrackEventInput, TrackingEvent};

use crate::extractors::{QueryParams, RequestContext, Tenant};
use crate::response::{ApiResponse, ApiResult};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct TrackResponse {
    pub tracking_id: String,
    pub timestamp: DateTime<Utc>,
}

/// POST /v1/tracking/track
pub async fn track(
    State(state): State<AppState>,
    ctx: RequestContext,
    tenant: Tenant,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<TrackResponse> {
    if body.len() > MAX_TRACK_BODY_BYTES {
        return Err(Error::validation_with_details(
            "Request body too large",
            vec![format!(
                "body: {} bytes exceeds the {} byte limit",
                body.len(),
                MAX_TRACK_BODY_BYTES
            )],
        )
        .into());
    }

    let input: TrackEventInput = serde_json::from_slice(&body).map_err(|e| {
        debug!(error = %e, "Rejecting malformed track body");
        Error::validation_with_details("Invalid JSON body", vec![e.to_string()])
    })?;

    let event = state
        .ingestion
        .track(&tenant.0, input, &ctx.hints(&headers))
        .await?;

    Ok(ApiResponse::ok(TrackResponse {
        tracking_id: event.id,
        timestamp: event.timestamp,
    }))
}

#[derive(Debug, Deserialize)]
pub struct StatisticsParams {
    pub app_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub group_by: Option<String>,
    pub limit: Option<u32>,
}

/// GET /v1/tracking/statistics
pub async fn statistics(
    State(state): State<AppState>,
    tenant: Tenant,
    QueryParams(params): QueryParams<StatisticsParams>,
) -> ApiResult<Statistics> {
    let app_id = tenant.scope(params.app_id.as_deref())?;
    let query = StatsQuery::parse(
        &app_id,
        params.start_date.as_deref(),
        params.end_date.as_deref(),
        params.group_by.as_deref(),
        params.limit,
    )?;
    let stats = state.statistics.get(&query).await?;
    Ok(ApiResponse::ok(stats))
}

#[derive(Debug, Deserialize)]
pub struct EventsParams {
    pub app_id: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u64>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct EventsResponse {
    pub app_id: String,
    pub events: Vec<TrackingEvent>,
    pub limit: u32,
    pub offset: u64,
    pub count: usize,
}

fn present(v: Option<&str>) -> Option<&str> {
    v.map(str::trim).filter(|v| !v.is_empty())
}

/// Both bounds, or neither.
fn optional_range(start: Option<&str>, end: Option<&str>) -> Result<Option<TimeRange>, Error> {
    match (present(start), present(end)) {
        (None, None) => Ok(None),
        (Some(start), Some(end)) => parse_range(start, end).map(Some),
        _ => Err(Error::validation(
            "start_date and end_date must be given together",
        )),
    }
}

fn page_limit(limit: Option<u32>) -> Result<u32, Error> {
    match limit {
        None => Ok(DEFAULT_PAGE_LIMIT),
        Some(0) => Err(Error::validation("limit must be at least 1")),
        Some(n) => Ok(n.min(MAX_PAGE_LIMIT)),
    }
}

/// GET /v1/tracking/events
pub async fn list_events(
    State(state): State<AppState>,
    tenant: Tenant,
    QueryParams(params): QueryParams<EventsParams>,
) -> ApiResult<EventsResponse> {
    let app_id = tenant.scope(params.app_id.as_deref())?;
    let limit = page_limit(params.limit)?;
    let offset = params.offset.unwrap_or(0);

    let events = match optional_range(params.start_date.as_deref(), params.end_date.as_deref())? {
        Some(range) => {
            state
                .events
                .get_by_time_range(&app_id, range, limit, offset)
                .await?
        }
        None => state.events.get_by_app_id(&app_id, limit, offset).await?,
    };

    Ok(ApiResponse::ok(EventsResponse {
        count: events.len(),
        app_id,
        events,
        limit,
        offset,
    }))
}

/// GET /v1/tracking/events/:id
pub async fn get_event(
    State(state): State<AppState>,
    tenant: Tenant,
    Path(id): Path<String>,
) -> ApiResult<TrackingEvent> {
    let event = state.events.get_by_id(tenant.app_id(), &id).await?;
    Ok(ApiResponse::ok(event))
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session_id: String,
    pub events: Vec<TrackingEvent>,
    pub count: usize,
}

/// GET /v1/tracking/sessions/:session_id
pub async fn get_session(
    State(state): State<AppState>,
    tenant: Tenant,
    Path(session_id): Path<String>,
) -> ApiResult<SessionResponse> {
    let events = state
        .events
        .get_by_session_id(tenant.app_id(), &session_id)
        .await?;
    Ok(ApiResponse::ok(SessionResponse {
        session_id,
        count: events.len(),
        events,
    }))
}

#[derive(Debug, Deserialize)]
pub struct ScopeParams {
    pub app_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub app_id: String,
    pub count: u64,
}

/// GET /v1/tracking/count
pub async fn count_events(
    State(state): State<AppState>,
    tenant: Tenant,
    QueryParams(params): QueryParams<ScopeParams>,
) -> ApiResult<CountResponse> {
    let app_id = tenant.scope(params.app_id.as_deref())?;
    let count = state.events.count_by_app_id(&app_id).await?;
    Ok(ApiResponse::ok(CountResponse { app_id, count }))
}

#[derive(Debug, Deserialize)]
pub struct DeleteParams {
    pub app_id: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeleteResponse {
    pub app_id: String,
    pub deleted: u64,
}

/// DELETE /v1/tracking/events
pub async fn delete_events(
    State(state): State<AppState>,
    tenant: Tenant,
    QueryParams(params): QueryParams<DeleteParams>,
) -> ApiResult<DeleteResponse> {
    let app_id = tenant.scope(params.app_id.as_deref())?;
    let range = optional_range(params.start_date.as_deref(), params.end_date.as_deref())?
        .ok_or_else(|| Error::validation("start_date and end_date are required"))?;

    let deleted = state.events.delete_by_time_range(&app_id, range).await?;
    info!(app_id = %app_id, deleted = deleted, "Deleted events in window");
    Ok(ApiResponse::ok(DeleteResponse { app_id, deleted }))
}
