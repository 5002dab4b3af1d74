//! Application (tenant) management endpoints.
//!
//! Only the create and regenerate responses carry a full API key; reads
//! show a masked hint.

use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracker_core::auth::mask_api_key;
use tracker_core::{Application, ApplicationStatus, CreateApplication, UpdateApplication};

use crate::extractors::{JsonBody, QueryParams};
use crate::response::{ApiResponse, ApiResult, Pagination};
use crate::state::AppState;

/// Application as shown by read endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct ApplicationView {
    pub app_id: String,
    pub name: String,
    pub description: Option<String>,
    pub domain: String,
    pub active: bool,
    pub status: ApplicationStatus,
    pub api_key_hint: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Application> for ApplicationView {
    fn from(app: Application) -> Self {
        Self {
            status: app.status(),
            api_key_hint: mask_api_key(&app.api_key),
            app_id: app.app_id,
            name: app.name,
            description: app.description,
            domain: app.domain,
            active: app.active,
            created_at: app.created_at,
            updated_at: app.updated_at,
        }
    }
}

/// POST /v1/applications
pub async fn create(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<CreateApplication>,
) -> ApiResult<Application> {
    let app = state.applications.create(request).await?;
    Ok(ApiResponse::created(app))
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub page: Option<u64>,
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct ApplicationList {
    pub applications: Vec<ApplicationView>,
    pub pagination: Pagination,
}

/// GET /v1/applications
pub async fn list(
    State(state): State<AppState>,
    QueryParams(params): QueryParams<ListParams>,
) -> ApiResult<ApplicationList> {
    let page = state.applications.list(params.page, params.limit).await?;
    Ok(ApiResponse::ok(ApplicationList {
        pagination: Pagination::new(page.page, page.limit, page.total),
        applications: page.items.into_iter().map(ApplicationView::from).collect(),
    }))
}

/// GET /v1/applications/:id
pub async fn get(
    State(state): State<AppState>,
    Path(app_id): Path<String>,
) -> ApiResult<ApplicationView> {
    let app = state.applications.get(&app_id).await?;
    Ok(ApiResponse::ok(app.into()))
}

/// PUT /v1/applications/:id
pub async fn update(
    State(state): State<AppState>,
    Path(app_id): Path<String>,
    JsonBody(request): JsonBody<UpdateApplication>,
) -> ApiResult<ApplicationView> {
    let app = state.applications.update(&app_id, request).await?;
    Ok(ApiResponse::ok(app.into()))
}

#[derive(Debug, Serialize)]
pub struct Deleted {
    pub app_id: String,
    pub deleted: bool,
}

/// DELETE /v1/applications/:id
pub async fn delete(
    State(state): State<AppState>,
    Path(app_id): Path<String>,
) -> ApiResult<Deleted> {
    state.applications.delete(&app_id).await?;
    Ok(ApiResponse::ok(Deleted {
        app_id,
        deleted: true,
    }))
}

#[derive(Debug, Serialize)]
pub struct Regenerated {
    pub app_id: String,
    pub new_api_key: String,
    pub updated_at: DateTime<Utc>,
}

/// POST /v1/applications/:id/api-key/regenerate
pub async fn regenerate_api_key(
    State(state): State<AppState>,
    Path(app_id): Path<String>,
) -> ApiResult<Regenerated> {
    let rotation = state.applications.regenerate_api_key(&app_id).await?;
    Ok(ApiResponse::ok(Regenerated {
        app_id: rotation.app_id,
        new_api_key: rotation.new_api_key,
        updated_at: rotation.updated_at,
    }))
}
