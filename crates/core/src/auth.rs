//! API keys and application identifiers.
//!
//! This module provides:
//! - Generation of application IDs and API keys
//! - Extraction of the API key from the `X-API-Key` header value
//! - The strict charset check used for path/query `app_id` values

use rand::RngCore;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::limits::MAX_APP_ID_LEN;

/// Prefix of every generated API key.
pub const API_KEY_PREFIX: &str = "ak_";

/// Prefix of every generated application ID.
pub const APP_ID_PREFIX: &str = "app_";

/// Random bytes behind an API key (256 bits).
const API_KEY_RANDOM_BYTES: usize = 32;

/// Charset accepted for application IDs arriving in paths and query strings.
static APP_ID_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("invalid app id pattern"));

/// Generate a new application ID (`app_` + 32 lowercase hex chars).
pub fn generate_app_id() -> String {
    format!("{}{}", APP_ID_PREFIX, Uuid::new_v4().simple())
}

/// Generate a new opaque, URL-safe API key with 256 bits of entropy.
pub fn generate_api_key() -> ApiKey {
    let mut bytes = [0u8; API_KEY_RANDOM_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    ApiKey(format!("{}{}", API_KEY_PREFIX, hex::encode(bytes)))
}

/// Check an application ID against the strict charset.
pub fn is_valid_app_id(app_id: &str) -> bool {
    !app_id.is_empty() && app_id.len() <= MAX_APP_ID_LEN && APP_ID_REGEX.is_match(app_id)
}

/// An API key as presented by a client or stored on an application.
///
/// `Debug` and `Display` only show a masked prefix so the secret never ends
/// up in logs.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ApiKey(String);

impl ApiKey {
    /// Wrap a raw key string.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Get the raw key string.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Consume into the raw key string.
    pub fn into_inner(self) -> String {
        self.0
    }

    /// Masked form safe for logging, e.g. `ak_1a2b…`.
    pub fn masked(&self) -> String {
        mask_api_key(&self.0)
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ApiKey").field(&self.masked()).finish()
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.masked())
    }
}

/// Mask a raw key, keeping at most the first 7 chars.
pub fn mask_api_key(raw: &str) -> String {
    let visible: String = raw.chars().take(7).collect();
    format!("{}…", visible)
}

/// Extract the API key from an `X-API-Key` header value.
///
/// A missing or blank header is an authentication error; whether the key
/// resolves to an application is decided later.
pub fn extract_api_key(header: Option<&str>) -> Result<ApiKey> {
    match header.map(str::trim) {
        Some(key) if !key.is_empty() => Ok(ApiKey::new(key)),
        _ => Err(Error::authentication("API key is required")),
    }
}
