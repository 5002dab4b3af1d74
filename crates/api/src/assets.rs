//! Beacon assets: the JS bundle, its per-tenant variant, and the pixel.

use bytes::Bytes;
use sha2::{Digest, Sha256};
use tracker_core::auth::is_valid_app_id;
use tracker_core::{Error, Result};

/// Canonical 43-byte 1x1 transparent GIF89a.
pub const TRANSPARENT_GIF: &[u8] = &[
    71, 73, 70, 56, 57, 97, 1, 0, 1, 0, 128, 0, 0, 0, 0, 0, 255, 255, 255, 33, 249, 4, 1, 0, 0, 0,
    0, 44, 0, 0, 0, 0, 1, 0, 1, 0, 0, 2, 2, 68, 1, 0, 59,
];

const TRACKER_JS: &str = include_str!("../assets/tracker.js");
const TRACKER_MIN_JS: &str = include_str!("../assets/tracker.min.js");

/// Literal both bundles carry; the per-tenant variant fills it in.
const APP_ID_SLOT: &str = "var PRESET_APP_ID = \"\";";

/// A served file with its validator.
#[derive(Debug, Clone)]
pub struct Asset {
    body: Bytes,
    etag: String,
}

impl Asset {
    pub fn new(body: impl Into<Bytes>) -> Self {
        let body = body.into();
        let etag = compute_etag(&body);
        Self { body, etag }
    }

    pub fn body(&self) -> Bytes {
        self.body.clone()
    }

    pub fn etag(&self) -> &str {
        &self.etag
    }

    /// Whether an `If-None-Match` header value names this asset.
    pub fn is_fresh(&self, if_none_match: Option<&str>) -> bool {
        let Some(header) = if_none_match else {
            return false;
        };
        header.split(',').map(str::trim).any(|candidate| {
            candidate == "*" || candidate.trim_start_matches("W/") == self.etag
        })
    }
}

/// Quoted SHA-256 of the bytes.
pub fn compute_etag(body: &[u8]) -> String {
    let hash = Sha256::digest(body);
    format!("\"{}\"", hex::encode(hash))
}

/// Bundles built once at startup.
#[derive(Debug, Clone)]
pub struct BeaconAssets {
    tracker: Asset,
    tracker_min: Asset,
}

impl BeaconAssets {
    pub fn new() -> Self {
        Self {
            tracker: Asset::new(TRACKER_JS),
            tracker_min: Asset::new(TRACKER_MIN_JS),
        }
    }

    pub fn tracker(&self) -> &Asset {
        &self.tracker
    }

    pub fn tracker_min(&self) -> &Asset {
        &self.tracker_min
    }

    /// Minified bundle with `app_id` embedded as a string literal.
    pub fn for_app(&self, app_id: &str) -> Result<Asset> {
        if !is_valid_app_id(app_id) {
            return Err(Error::validation_with_details(
                "Invalid app_id",
                vec!["app_id: must be 1-64 characters of [A-Za-z0-9_-]".to_string()],
            ));
        }
        let slot = format!("var PRESET_APP_ID = \"{}\";", app_id);
        Ok(Asset::new(TRACKER_MIN_JS.replacen(APP_ID_SLOT, &slot, 1)))
    }
}

impl Default for BeaconAssets {
    fn default() -> Self {
        Self::new()
    }
}
