//! Fixed-window rate limiting over the shared cache.
//!
//! Counters live at `rate_limit:<tenant>:<ip>:<window>`. The read and the
//! increment are separate round trips, so concurrent requests from one
//! origin can over-admit by their parallelism. A cache outage admits.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use telemetry::metrics;
use tracing::{debug, warn};
use tracker_cache::keys::{self, Window};
use tracker_cache::{Cache, CacheResult, Pipeline};
use tracker_core::{Error, Result};

use crate::config::RateLimitConfig;
use crate::extractors::{ClientIp, RequestContext, Tenant};
use crate::response::ApiError;
use crate::state::AppState;

/// Windowed limiter.
pub struct RateLimiter {
    cache: Arc<dyn Cache>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(cache: Arc<dyn Cache>, config: RateLimitConfig) -> Self {
        Self { cache, config }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Admit or reject one request. Rejection is `RATE_LIMIT_EXCEEDED`;
    /// cache failures admit.
    pub async fn check(&self, tenant: Option<&str>, client_ip: &str) -> Result<()> {
        match self.try_check(tenant, client_ip).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(error = %e, "Rate limiter cache unavailable, admitting request");
                metrics().rate_limiter_fail_open.inc();
                Ok(())
            }
        }
    }

    async fn try_check(&self, tenant: Option<&str>, client_ip: &str) -> CacheResult<Result<()>> {
        let minute_key = keys::rate_limit(tenant, client_ip, Window::Minute);
        let hour_key = keys::rate_limit(tenant, client_ip, Window::Hour);
        let hourly = self.config.requests_per_hour > 0;

        let counts = if hourly {
            self.cache
                .mget(&[minute_key.clone(), hour_key.clone()])
                .await?
        } else {
            vec![self.cache.get(&minute_key).await?]
        };
        let count = |i: usize| -> u64 {
            counts
                .get(i)
                .and_then(|v| v.as_deref())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(0)
        };

        if count(0) >= self.config.requests_per_minute {
            return self
                .rejection(&minute_key, Window::Minute, self.config.requests_per_minute)
                .await;
        }
        if hourly && count(1) >= self.config.requests_per_hour {
            return self
                .rejection(&hour_key, Window::Hour, self.config.requests_per_hour)
                .await;
        }

        let mut pipeline = Pipeline::new();
        pipeline.incr(minute_key.clone());
        pipeline.expire_nx(minute_key, Window::Minute.duration());
        if hourly {
            pipeline.incr(hour_key.clone());
            pipeline.expire_nx(hour_key, Window::Hour.duration());
        }
        self.cache.execute(pipeline).await?;

        Ok(Ok(()))
    }

    async fn rejection(&self, key: &str, window: Window, limit: u64) -> CacheResult<Result<()>> {
        let reset_secs = self
            .cache
            .ttl(key)
            .await?
            .map(|ttl| ttl.as_secs().max(1))
            .unwrap_or_else(|| window.duration().as_secs());

        debug!(key = %key, limit = limit, reset_secs = reset_secs, "Rate limit exceeded");
        metrics().rate_limited_requests.inc();
        Ok(Err(Error::RateLimited { limit, reset_secs }))
    }
}

/// Rate-limit stage. Uses the tenant if an earlier stage established one,
/// otherwise counts the client as anonymous.
pub async fn rate_limit(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let client_ip = match request.extensions().get::<RequestContext>() {
        Some(ctx) => ctx.client_ip.clone(),
        None => ClientIp::resolve(request.headers(), request.extensions()).0,
    };
    let tenant = request
        .extensions()
        .get::<Tenant>()
        .map(|t| t.app_id().to_string());

    match state
        .rate_limiter
        .check(tenant.as_deref(), &client_ip)
        .await
    {
        Ok(()) => next.run(request).await,
        Err(e) => ApiError::from(e).into_response(),
    }
}
