//! HTTP front-end for the web tracker: envelope, extractors, request
//! pipeline stages, services, and routes.

pub mod assets;
pub mod config;
pub mod extractors;
pub mod middleware;
pub mod response;
pub mod routes;
pub mod services;
pub mod state;

pub use config::{ApiConfig, CorsConfig, RateLimitConfig, TimeoutConfig};
pub use routes::router;
pub use state::AppState;
