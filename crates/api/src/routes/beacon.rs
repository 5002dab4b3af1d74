//! Tracking pixel and beacon snippet endpoints.

use axum::{
    extract::{RawQuery, State},
    http::{header, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use telemetry::metrics;
use tracing::{debug, warn};
use tracker_core::auth::is_valid_app_id;
use tracker_core::{Error, TrackEventInput};

use crate::assets::TRANSPARENT_GIF;
use crate::extractors::{JsonBody, RequestContext, Tenant};
use crate::response::{ApiError, ApiResponse, ApiResult};
use crate::state::AppState;

/// The pixel body, never cached.
pub fn gif_response() -> Response {
    (
        [
            (header::CONTENT_TYPE, HeaderValue::from_static("image/gif")),
            (
                header::CACHE_CONTROL,
                HeaderValue::from_static("no-cache, no-store, must-revalidate"),
            ),
            (header::PRAGMA, HeaderValue::from_static("no-cache")),
            (header::EXPIRES, HeaderValue::from_static("0")),
        ],
        TRANSPARENT_GIF,
    )
        .into_response()
}

fn parse_query(raw: Option<&str>) -> BTreeMap<String, String> {
    url::form_urlencoded::parse(raw.unwrap_or("").as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

/// GET /beacon.gif, /beacon and /v1/beacon/generate
///
/// A missing `app_id` is a client error. Past that point the GIF is always
/// served; an unknown tenant or a failed write is logged and counted.
pub async fn pixel(
    State(state): State<AppState>,
    ctx: RequestContext,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
) -> Response {
    let params = parse_query(query.as_deref());
    let app_id = match params.get("app_id").map(|v| v.trim()) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => {
            return ApiError::from(Error::validation_with_details(
                "Validation failed",
                vec!["app_id: is required".to_string()],
            ))
            .into_response()
        }
    };
    metrics().beacon_hits.inc();

    let app = match state.applications.get(&app_id).await {
        Ok(app) => app,
        Err(e) => {
            debug!(app_id = %app_id, code = e.code().code(), "Dropping beacon for unresolved app");
            metrics().beacon_dropped.inc();
            return gif_response();
        }
    };

    let outcome = match TrackEventInput::from_pixel_query(params) {
        Ok(input) => {
            state
                .ingestion
                .track_pixel(&app, input, &ctx.hints(&headers))
                .await
        }
        Err(e) => Err(e),
    };
    if let Err(e) = outcome {
        warn!(
            app_id = %app_id,
            request_id = %ctx.request_id,
            error = %e,
            "Beacon event not recorded"
        );
        metrics().beacon_dropped.inc();
    }

    gif_response()
}

#[derive(Debug, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub app_id: Option<String>,
    #[serde(default)]
    pub include_pixel: Option<bool>,
}

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    pub app_id: String,
    pub script_url: String,
    pub pixel_url: String,
    pub snippet: String,
}

/// Embed snippet for a site.
pub fn build_snippet(base_url: &str, app_id: &str, include_pixel: bool) -> GenerateResponse {
    let script_url = format!("{}/tracker/{}", base_url, app_id);
    let pixel_url = format!("{}/beacon.gif?app_id={}", base_url, app_id);

    let mut snippet = format!("<script async src=\"{}\"></script>", script_url);
    if include_pixel {
        snippet.push_str(&format!(
            "\n<noscript><img src=\"{}\" width=\"1\" height=\"1\" alt=\"\" style=\"display:none\"></noscript>",
            pixel_url
        ));
    }

    GenerateResponse {
        app_id: app_id.to_string(),
        script_url,
        pixel_url,
        snippet,
    }
}

/// POST /v1/beacon/generate
///
/// With an API key the body's `app_id` may be omitted and must otherwise
/// name the key's application.
pub async fn generate(
    State(state): State<AppState>,
    tenant: Option<Tenant>,
    JsonBody(request): JsonBody<GenerateRequest>,
) -> ApiResult<GenerateResponse> {
    let app_id = match tenant {
        Some(tenant) => tenant.scope(request.app_id.as_deref())?,
        None => request
            .app_id
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| {
                Error::validation_with_details(
                    "Validation failed",
                    vec!["app_id: is required".to_string()],
                )
            })?,
    };
    if !is_valid_app_id(&app_id) {
        return Err(Error::validation("Invalid app_id").into());
    }

    let app = state.applications.get(&app_id).await?;
    app.ensure_active()?;

    Ok(ApiResponse::ok(build_snippet(
        state.config.base_url(),
        &app.app_id,
        request.include_pixel.unwrap_or(true),
    )))
}

#[derive(Debug, Serialize)]
pub struct BeaconHealth {
    pub status: &'static str,
}

/// GET /v1/beacon/health
pub async fn beacon_health() -> ApiResponse<BeaconHealth> {
    ApiResponse::ok(BeaconHealth { status: "healthy" })
}
