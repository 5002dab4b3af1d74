//! Request pipeline stages, outermost first: deadline, rate limit,
//! authentication.

pub mod auth;
pub mod cors;
pub mod deadline;
pub mod rate_limit;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::any::Any;
use tracing::error;

use crate::response::ApiError;

/// Routing answers unknown method+path pairs with 404, like unknown paths.
pub async fn method_not_allowed_as_not_found(response: Response) -> Response {
    if response.status() == StatusCode::METHOD_NOT_ALLOWED {
        return ApiError::not_found("Route not found").into_response();
    }
    response
}

/// Render a recovered panic as `INTERNAL_ERROR`.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(panic = %detail, "Handler panicked");
    ApiError::internal().into_response()
}
