//! API routes.
//!
//! Route groups differ in deadline budget, rate limiting, and
//! authentication. Within a group the stages run deadline, then rate
//! limit, then authentication.

pub mod applications;
pub mod assets;
pub mod beacon;
pub mod health;
pub mod tracking;

use axum::{
    extract::State,
    middleware::{from_fn_with_state, map_response},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer, compression::CompressionLayer, trace::TraceLayer,
};

use crate::config::ApiConfig;
use crate::middleware::{
    auth, cors::cors_layer, deadline, method_not_allowed_as_not_found, panic_response,
    rate_limit,
};
use crate::response::{ApiError, ApiResponse};
use crate::state::AppState;

#[derive(Debug, Clone, Copy)]
enum Access {
    Public,
    OptionalKey,
    ApiKey,
}

/// Wrap a route group in its stages. `route_layer` wraps outward, so the
/// last layer added runs first.
fn guarded(
    routes: Router<AppState>,
    state: &AppState,
    budget: Duration,
    rate_limited: bool,
    access: Access,
) -> Router<AppState> {
    let routes = match access {
        Access::Public => routes,
        Access::OptionalKey => {
            routes.route_layer(from_fn_with_state(state.clone(), auth::optional_api_key))
        }
        Access::ApiKey => {
            routes.route_layer(from_fn_with_state(state.clone(), auth::require_api_key))
        }
    };
    let routes = if rate_limited {
        routes.route_layer(from_fn_with_state(state.clone(), rate_limit::rate_limit))
    } else {
        routes
    };
    routes.route_layer(from_fn_with_state(budget, deadline::deadline))
}

/// Creates the API router.
pub fn router(state: AppState) -> Router {
    let timeouts = state.config.timeouts.clone();

    let ingest = guarded(
        Router::new().route("/v1/tracking/track", post(tracking::track)),
        &state,
        timeouts.tracking(),
        true,
        Access::ApiKey,
    );

    let reads = guarded(
        Router::new()
            .route("/v1/tracking/events/:id", get(tracking::get_event))
            .route("/v1/tracking/sessions/:session_id", get(tracking::get_session))
            .route("/v1/tracking/count", get(tracking::count_events)),
        &state,
        timeouts.default_budget(),
        true,
        Access::ApiKey,
    );

    let long_running = guarded(
        Router::new()
            .route("/v1/tracking/statistics", get(tracking::statistics))
            .route(
                "/v1/tracking/events",
                get(tracking::list_events).delete(tracking::delete_events),
            ),
        &state,
        timeouts.long_running(),
        true,
        Access::ApiKey,
    );

    let beacon = guarded(
        Router::new()
            .route("/beacon.gif", get(beacon::pixel))
            .route("/beacon", get(beacon::pixel))
            .route(
                "/v1/beacon/generate",
                get(beacon::pixel).post(beacon::generate),
            ),
        &state,
        timeouts.tracking(),
        true,
        Access::OptionalKey,
    );

    let mut public = Router::new()
        .route("/v1/beacon/health", get(beacon::beacon_health))
        .route("/tracker.js", get(assets::tracker_js))
        .route("/tracker.min.js", get(assets::tracker_min_js))
        .route("/tracker/:app_id", get(assets::tracker_for_app))
        .route(
            "/v1/applications",
            post(applications::create).get(applications::list),
        )
        .route(
            "/v1/applications/:id",
            get(applications::get)
                .put(applications::update)
                .delete(applications::delete),
        )
        .route(
            "/v1/applications/:id/api-key/regenerate",
            post(applications::regenerate_api_key),
        )
        .route("/health", get(health::health_handler))
        .route("/ready", get(health::ready_handler))
        .route("/live", get(health::live_handler));
    if state.config.debug {
        public = public.route("/debug/config", get(debug_config));
    }
    let public = guarded(
        public,
        &state,
        timeouts.default_budget(),
        false,
        Access::Public,
    );

    Router::new()
        .merge(ingest)
        .merge(reads)
        .merge(long_running)
        .merge(beacon)
        .merge(public)
        .fallback(not_found)
        .layer(
            ServiceBuilder::new()
                .layer(CompressionLayer::new())
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(&state.config.cors))
                .layer(CatchPanicLayer::custom(panic_response))
                .layer(map_response(method_not_allowed_as_not_found)),
        )
        .with_state(state)
}

async fn not_found() -> Response {
    ApiError::not_found("Route not found").into_response()
}

/// GET /debug/config - Effective HTTP configuration. Mounted only when
/// `debug` is set.
async fn debug_config(State(state): State<AppState>) -> ApiResponse<ApiConfig> {
    ApiResponse::ok(state.config.as_ref().clone())
}
