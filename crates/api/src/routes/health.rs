//! Health check endpoints.
//!
//! Each request probes the backing stores live and records the outcome in
//! the process health registry before answering.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use telemetry::{health, metrics, HealthReport, MetricsSnapshot};
use tracker_core::{Deadline, Error, ErrorCode};

use crate::response::{ApiError, ApiResponse};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthBody {
    #[serde(flatten)]
    pub report: HealthReport,
    pub version: &'static str,
    pub metrics: MetricsSnapshot,
}

async fn probe_postgres(state: &AppState) -> bool {
    let budget = Deadline::after(state.config.timeouts.external());
    let result = budget.run(state.applications.store().ping()).await;
    health().postgres.record(&result);
    result.is_ok()
}

async fn probe_redis(state: &AppState) -> bool {
    let budget = Deadline::after(state.config.timeouts.external());
    let result = budget
        .run(async {
            state
                .cache
                .ping()
                .await
                .map_err(|e| Error::cache(e.to_string()))
        })
        .await;
    health().redis.record(&result);
    result.is_ok()
}

/// GET /health - Component report plus counters.
pub async fn health_handler(State(state): State<AppState>) -> ApiResponse<HealthBody> {
    tokio::join!(probe_postgres(&state), probe_redis(&state));

    ApiResponse::ok(HealthBody {
        report: health().report(),
        version: env!("CARGO_PKG_VERSION"),
        metrics: metrics().snapshot(),
    })
}

#[derive(Debug, Serialize)]
pub struct ReadyBody {
    pub ready: bool,
}

/// GET /ready - 200 only while Postgres answers.
pub async fn ready_handler(State(state): State<AppState>) -> Response {
    if probe_postgres(&state).await {
        ApiResponse::ok(ReadyBody { ready: true }).into_response()
    } else {
        ApiError::new(
            StatusCode::SERVICE_UNAVAILABLE,
            ErrorCode::StoreUnavailable,
            "Database is not reachable",
        )
        .into_response()
    }
}

#[derive(Debug, Serialize)]
pub struct LiveBody {
    pub status: &'static str,
}

/// GET /live - The process is up.
pub async fn live_handler() -> ApiResponse<LiveBody> {
    ApiResponse::ok(LiveBody { status: "alive" })
}
