//! Tracker bundle endpoints with `ETag` revalidation.

use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

use crate::assets::Asset;
use crate::response::ApiError;
use crate::state::AppState;

const JS_CONTENT_TYPE: &str = "application/javascript; charset=utf-8";
const JS_CACHE_CONTROL: &str = "public, max-age=86400";

/// Serve an asset, or `304` when `If-None-Match` already names it.
pub fn serve(asset: &Asset, headers: &HeaderMap) -> Response {
    let if_none_match = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok());

    let mut response = if asset.is_fresh(if_none_match) {
        StatusCode::NOT_MODIFIED.into_response()
    } else {
        (
            [(header::CONTENT_TYPE, HeaderValue::from_static(JS_CONTENT_TYPE))],
            asset.body(),
        )
            .into_response()
    };

    let response_headers = response.headers_mut();
    response_headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(JS_CACHE_CONTROL),
    );
    if let Ok(etag) = HeaderValue::from_str(asset.etag()) {
        response_headers.insert(header::ETAG, etag);
    }
    response
}

/// GET /tracker.js
pub async fn tracker_js(State(state): State<AppState>, headers: HeaderMap) -> Response {
    serve(state.assets.tracker(), &headers)
}

/// GET /tracker.min.js
pub async fn tracker_min_js(State(state): State<AppState>, headers: HeaderMap) -> Response {
    serve(state.assets.tracker_min(), &headers)
}

/// GET /tracker/:app_id
pub async fn tracker_for_app(
    State(state): State<AppState>,
    Path(app_id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let asset = state.assets.for_app(&app_id)?;
    Ok(serve(&asset, &headers))
}
