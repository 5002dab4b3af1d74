//! CORS policy: a static allow-list plus subdomains of one parent domain.

use axum::http::{header, HeaderName, HeaderValue, Method};
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::warn;

use crate::config::CorsConfig;

/// Origin matcher built from [`CorsConfig`].
#[derive(Debug, Clone)]
pub struct OriginPolicy {
    exact: Vec<String>,
    parent_domain: Option<String>,
}

impl OriginPolicy {
    pub fn new(config: &CorsConfig) -> Self {
        Self {
            exact: config
                .allowed_origins
                .iter()
                .map(|o| normalize(o))
                .filter(|o| !o.is_empty())
                .collect(),
            parent_domain: config
                .parent_domain
                .as_deref()
                .map(|d| d.trim().trim_start_matches('.').to_ascii_lowercase())
                .filter(|d| !d.is_empty()),
        }
    }

    pub fn allows(&self, origin: &str) -> bool {
        let origin = normalize(origin);
        if self.exact.iter().any(|allowed| *allowed == origin) {
            return true;
        }

        let Some(ref parent) = self.parent_domain else {
            return false;
        };
        let Ok(url) = url::Url::parse(&origin) else {
            return false;
        };
        if !matches!(url.scheme(), "http" | "https") {
            return false;
        }
        match url.host_str() {
            Some(host) => host == parent || host.ends_with(&format!(".{}", parent)),
            None => false,
        }
    }
}

fn normalize(origin: &str) -> String {
    origin.trim().trim_end_matches('/').to_ascii_lowercase()
}

/// Build the CORS layer. Unparseable methods or headers are skipped with a
/// warning.
pub fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let policy = OriginPolicy::new(config);

    let methods: Vec<Method> = config
        .allowed_methods
        .iter()
        .filter_map(|m| match m.trim().to_ascii_uppercase().parse() {
            Ok(method) => Some(method),
            Err(_) => {
                warn!(method = %m, "Ignoring invalid CORS method");
                None
            }
        })
        .collect();

    let headers: Vec<HeaderName> = config
        .allowed_headers
        .iter()
        .filter_map(|h| match HeaderName::try_from(h.trim().to_ascii_lowercase()) {
            Ok(name) => Some(name),
            Err(_) => {
                warn!(header = %h, "Ignoring invalid CORS header");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _parts| {
                origin.to_str().map(|o| policy.allows(o)).unwrap_or(false)
            },
        ))
        .allow_methods(methods)
        .allow_headers(headers)
        .allow_credentials(config.allow_credentials)
        .expose_headers([
            header::ETAG,
            header::RETRY_AFTER,
            HeaderName::from_static("x-ratelimit-limit"),
            HeaderName::from_static("x-ratelimit-remaining"),
            HeaderName::from_static("x-ratelimit-reset"),
            HeaderName::from_static("x-request-id"),
        ])
        .max_age(Duration::from_secs(config.max_age))
}
