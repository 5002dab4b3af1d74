//! Per-request deadline stage.
//!
//! Installs the [`RequestContext`] and bounds everything downstream by the
//! route's budget. An expired budget answers `408`; dropping the inner
//! future abandons whatever it was awaiting.

use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::time::Duration;
use tracing::warn;
use tracker_core::Deadline;

use crate::extractors::{ClientIp, RequestContext};
use crate::response::ApiError;

pub async fn deadline(State(budget): State<Duration>, mut request: Request, next: Next) -> Response {
    let deadline = Deadline::after(budget);
    let ctx = RequestContext::new(
        ClientIp::resolve(request.headers(), request.extensions()),
        deadline,
    );
    let request_id = ctx.request_id.clone();
    let path = request.uri().path().to_string();
    request.extensions_mut().insert(ctx);

    let mut response = match deadline
        .run(async { Ok(next.run(request).await) })
        .await
    {
        Ok(response) => response,
        Err(e) => {
            warn!(
                request_id = %request_id,
                path = %path,
                budget_ms = budget.as_millis() as u64,
                "Request deadline exceeded"
            );
            ApiError::from(e).into_response()
        }
    };

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }
    response
}
