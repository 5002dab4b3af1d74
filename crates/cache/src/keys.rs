//! Cache key schema.

use std::time::Duration;

/// Tenant label used before authentication has run.
pub const ANONYMOUS: &str = "anonymous";

/// Fixed rate-limit window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    Minute,
    Hour,
}

impl Window {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Minute => "minute",
            Self::Hour => "hour",
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            Self::Minute => Duration::from_secs(60),
            Self::Hour => Duration::from_secs(3600),
        }
    }
}

/// `rate_limit:<tenant>:<ip>:<window>`
pub fn rate_limit(tenant: Option<&str>, client_ip: &str, window: Window) -> String {
    format!(
        "rate_limit:{}:{}:{}",
        tenant.unwrap_or(ANONYMOUS),
        client_ip,
        window.as_str()
    )
}

/// `app:by_api_key:<api_key>`
pub fn app_by_api_key(api_key: &str) -> String {
    format!("app:by_api_key:{}", api_key)
}

/// `app:by_id:<app_id>`
pub fn app_by_id(app_id: &str) -> String {
    format!("app:by_id:{}", app_id)
}

/// `stats:<app_id>:<start>:<end>:<group_by>:<limit>`
pub fn stats(app_id: &str, start: &str, end: &str, group_by: &str, limit: u32) -> String {
    format!("stats:{}:{}:{}:{}:{}", app_id, start, end, group_by, limit)
}
