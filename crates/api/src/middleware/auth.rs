//! API-key authentication stages.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::debug;
use tracker_core::auth::extract_api_key;
use tracker_core::{Application, Result};

use crate::extractors::Tenant;
use crate::response::ApiError;
use crate::state::AppState;

pub const API_KEY_HEADER: &str = "x-api-key";

/// Resolve the `X-API-Key` header to an active application.
///
/// Missing or blank is `AUTHENTICATION_ERROR`, unknown is
/// `INVALID_API_KEY`, inactive is `APPLICATION_INACTIVE`.
pub async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Application> {
    let header = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok());
    let api_key = extract_api_key(header)?;
    state.applications.authenticate(&api_key).await
}

/// Reject the request unless it carries a usable key.
pub async fn require_api_key(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticate(&state, request.headers()).await {
        Ok(app) => {
            request.extensions_mut().insert(Tenant(Arc::new(app)));
            next.run(request).await
        }
        Err(e) => ApiError::from(e).into_response(),
    }
}

/// Attach the tenant when the key resolves; continue regardless.
pub async fn optional_api_key(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    match authenticate(&state, request.headers()).await {
        Ok(app) => {
            request.extensions_mut().insert(Tenant(Arc::new(app)));
        }
        Err(e) => debug!(code = e.code().code(), "Continuing without tenant"),
    }
    next.run(request).await
}
