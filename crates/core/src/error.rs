//! Unified error types for the tracker.
//!
//! Every error surfaced over HTTP carries one of the stable codes below:
//! - VALIDATION_FAILED: bad input shape or domain-rule violation
//! - AUTHENTICATION_ERROR / INVALID_API_KEY: missing or unresolvable key
//! - APPLICATION_INACTIVE / FORBIDDEN: resolved tenant may not do this
//! - NOT_FOUND, DUPLICATE, RATE_LIMIT_EXCEEDED, REQUEST_TIMEOUT
//! - STORE_UNAVAILABLE / CACHE_UNAVAILABLE / INTERNAL_ERROR: server faults

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Stable error codes shared by every surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ValidationFailed,
    AuthenticationError,
    InvalidApiKey,
    ApplicationInactive,
    Forbidden,
    NotFound,
    Duplicate,
    RateLimitExceeded,
    RequestTimeout,
    StoreUnavailable,
    CacheUnavailable,
    Internal,
}

impl ErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::ValidationFailed => "VALIDATION_FAILED",
            Self::AuthenticationError => "AUTHENTICATION_ERROR",
            Self::InvalidApiKey => "INVALID_API_KEY",
            Self::ApplicationInactive => "APPLICATION_INACTIVE",
            Self::Forbidden => "FORBIDDEN",
            Self::NotFound => "NOT_FOUND",
            Self::Duplicate => "DUPLICATE",
            Self::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            Self::RequestTimeout => "REQUEST_TIMEOUT",
            Self::StoreUnavailable => "STORE_UNAVAILABLE",
            Self::CacheUnavailable => "CACHE_UNAVAILABLE",
            Self::Internal => "INTERNAL_ERROR",
        }
    }

    /// Get the HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Self::ValidationFailed => 400,
            Self::AuthenticationError => 401,
            Self::InvalidApiKey => 401,
            Self::ApplicationInactive => 403,
            Self::Forbidden => 403,
            Self::NotFound => 404,
            Self::RequestTimeout => 408,
            Self::Duplicate => 409,
            Self::RateLimitExceeded => 429,
            Self::StoreUnavailable => 500,
            Self::CacheUnavailable => 500,
            Self::Internal => 500,
        }
    }

    /// Whether the error is the server's fault rather than the caller's.
    pub fn is_server_error(&self) -> bool {
        self.http_status() >= 500
    }
}

/// Unified error type for the tracker.
#[derive(Debug, Error)]
pub enum Error {
    #[error("validation failed: {message}")]
    Validation {
        message: String,
        details: Vec<String>,
    },

    #[error("authentication error: {0}")]
    Authentication(String),

    #[error("invalid api key")]
    InvalidApiKey,

    #[error("application {0} is inactive")]
    ApplicationInactive(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("duplicate: {0}")]
    Duplicate(String),

    #[error("rate limit exceeded")]
    RateLimited { limit: u64, reset_secs: u64 },

    #[error("request timed out")]
    Timeout,

    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("cache unavailable: {0}")]
    CacheUnavailable(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            details: Vec::new(),
        }
    }

    pub fn validation_with_details(msg: impl Into<String>, details: Vec<String>) -> Self {
        Self::Validation {
            message: msg.into(),
            details,
        }
    }

    pub fn authentication(msg: impl Into<String>) -> Self {
        Self::Authentication(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    pub fn duplicate(msg: impl Into<String>) -> Self {
        Self::Duplicate(msg.into())
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::StoreUnavailable(msg.into())
    }

    pub fn cache(msg: impl Into<String>) -> Self {
        Self::CacheUnavailable(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// The stable code for this error.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Validation { .. } => ErrorCode::ValidationFailed,
            Self::Serialization(_) => ErrorCode::ValidationFailed,
            Self::Authentication(_) => ErrorCode::AuthenticationError,
            Self::InvalidApiKey => ErrorCode::InvalidApiKey,
            Self::ApplicationInactive(_) => ErrorCode::ApplicationInactive,
            Self::Forbidden(_) => ErrorCode::Forbidden,
            Self::NotFound(_) => ErrorCode::NotFound,
            Self::Duplicate(_) => ErrorCode::Duplicate,
            Self::RateLimited { .. } => ErrorCode::RateLimitExceeded,
            Self::Timeout => ErrorCode::RequestTimeout,
            Self::StoreUnavailable(_) => ErrorCode::StoreUnavailable,
            Self::CacheUnavailable(_) => ErrorCode::CacheUnavailable,
            Self::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Get the HTTP status code for this error.
    pub fn http_status(&self) -> u16 {
        self.code().http_status()
    }

    /// Message safe to return to a client. Server faults are reported
    /// generically; the detail stays in the logs.
    pub fn public_message(&self) -> String {
        match self {
            Self::StoreUnavailable(_) => "Storage is temporarily unavailable, retry later".into(),
            Self::CacheUnavailable(_) => "Cache is temporarily unavailable".into(),
            Self::Internal(_) => "Internal server error".into(),
            Self::Validation { message, .. } => message.clone(),
            Self::Serialization(e) => format!("Invalid JSON: {}", e),
            other => {
                let mut msg = other.to_string();
                if let Some(first) = msg.get_mut(0..1) {
                    first.make_ascii_uppercase();
                }
                msg
            }
        }
    }

    /// Field-level details, when the error carries any.
    pub fn details(&self) -> Option<&[String]> {
        match self {
            Self::Validation { details, .. } if !details.is_empty() => Some(details),
            _ => None,
        }
    }
}

impl From<validator::ValidationErrors> for Error {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut details: Vec<String> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                errs.iter().map(move |e| match &e.message {
                    Some(msg) => format!("{}: {}", field, msg),
                    None => format!("{}: {}", field, e.code),
                })
            })
            .collect();
        details.sort();
        Self::validation_with_details("Validation failed", details)
    }
}
