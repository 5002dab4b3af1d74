//! Tracking events: the persisted record, the custom-parameter blob, and
//! the inbound shapes accepted from the JSON API and the pixel beacon.

use chrono::{DateTime, Utc};
use serde::de::{self, Deserializer};
use serde::ser::{self, Serializer};
use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use std::collections::BTreeMap;
use uuid::Uuid;
use validator::Validate;

use crate::error::{Error, Result};
use crate::limits::{MAX_CUSTOM_PARAMETERS_BYTES, MAX_PIXEL_EXTRA_PARAMS};

/// Free-form JSON object attached to an event.
///
/// Held as its encoded text so the ingest path never builds a `Value`
/// tree; `parse` decodes on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomParameters(String);

impl CustomParameters {
    pub fn empty() -> Self {
        Self("{}".to_string())
    }

    /// Wrap encoded JSON, checking that it is an object.
    pub fn from_json(raw: impl Into<String>) -> Result<Self> {
        let raw = raw.into();
        let parsed: &RawValue = serde_json::from_str(&raw)
            .map_err(|e| Error::validation(format!("custom_params: invalid JSON: {}", e)))?;
        Self::from_raw(parsed)
    }

    fn from_raw(raw: &RawValue) -> Result<Self> {
        let text = raw.get().trim();
        if !text.starts_with('{') {
            return Err(Error::validation("custom_params must be a JSON object"));
        }
        Ok(Self(text.to_string()))
    }

    /// Build from flat string pairs (pixel query extras).
    pub fn from_pairs(pairs: &BTreeMap<String, String>) -> Result<Self> {
        Ok(Self(serde_json::to_string(pairs)?))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }

    pub fn encoded_len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0 == "{}"
    }

    /// Reject blobs above the encoded size cap.
    pub fn check_size(&self) -> Result<()> {
        if self.encoded_len() > MAX_CUSTOM_PARAMETERS_BYTES {
            return Err(Error::validation_with_details(
                "Custom parameters too large",
                vec![format!(
                    "custom_params: {} bytes exceeds the {} byte limit",
                    self.encoded_len(),
                    MAX_CUSTOM_PARAMETERS_BYTES
                )],
            ));
        }
        Ok(())
    }

    /// Decode into any deserializable type.
    pub fn parse<T: for<'de> Deserialize<'de>>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.0)?)
    }

    pub fn to_value(&self) -> Result<serde_json::Value> {
        self.parse()
    }
}

impl Default for CustomParameters {
    fn default() -> Self {
        Self::empty()
    }
}

impl Serialize for CustomParameters {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let raw: &RawValue = serde_json::from_str(&self.0).map_err(ser::Error::custom)?;
        raw.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for CustomParameters {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = Box::<RawValue>::deserialize(deserializer)?;
        Self::from_raw(&raw).map_err(|e| de::Error::custom(e.public_message()))
    }
}

/// One persisted page view or custom hit. Immutable after insert.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackingEvent {
    pub id: String,
    pub app_id: String,
    pub session_id: String,
    pub visitor_id: String,
    pub page_url: String,
    pub page_title: Option<String>,
    pub referrer: Option<String>,
    pub user_agent: String,
    pub ip_address: String,
    pub country: Option<String>,
    pub region: Option<String>,
    pub city: Option<String>,
    pub device_type: Option<String>,
    pub browser: Option<String>,
    pub os: Option<String>,
    pub language: Option<String>,
    pub timezone: Option<String>,
    #[serde(default)]
    pub custom_parameters: CustomParameters,
    pub timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Generate an event ID.
pub fn new_event_id() -> String {
    Uuid::new_v4().to_string()
}

/// Request-derived facts used to complete an event.
#[derive(Debug, Clone, Default)]
pub struct ClientHints {
    /// Resolved client IP (forwarded header or socket peer).
    pub client_ip: Option<String>,
    pub user_agent: Option<String>,
    pub accept_language: Option<String>,
    /// Country code supplied by a CDN edge header.
    pub country: Option<String>,
}

impl TrackingEvent {
    /// Build an event for `app_id` from validated input.
    ///
    /// Assigns a fresh ID and the server's clock; any client-side timestamp
    /// is ignored.
    pub fn from_input(app_id: &str, input: TrackEventInput, hints: &ClientHints) -> Result<Self> {
        let custom_parameters = input.custom_params.unwrap_or_default();
        custom_parameters.check_size()?;

        let user_agent = non_empty(input.user_agent)
            .or_else(|| hints.user_agent.clone())
            .unwrap_or_default();
        let ip_address = non_empty(input.ip_address)
            .or_else(|| hints.client_ip.clone())
            .unwrap_or_default();

        let now = Utc::now();
        Ok(Self {
            id: new_event_id(),
            app_id: app_id.to_string(),
            session_id: input.session_id.unwrap_or_default(),
            visitor_id: input.visitor_id.unwrap_or_default(),
            page_url: input.url.unwrap_or_default(),
            page_title: non_empty(input.page_title),
            referrer: non_empty(input.referrer),
            user_agent,
            ip_address,
            country: hints.country.clone(),
            region: None,
            city: None,
            device_type: None,
            browser: None,
            os: None,
            language: non_empty(input.language),
            timezone: non_empty(input.timezone),
            custom_parameters,
            timestamp: now,
            created_at: now,
        })
    }

    /// Replace the ID after a primary-key collision.
    pub fn reassign_id(&mut self) {
        self.id = new_event_id();
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// JSON body of `POST /v1/tracking/track`.
///
/// Length caps are literals because the derive needs them; they mirror
/// `limits`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct TrackEventInput {
    #[serde(default)]
    pub app_id: Option<String>,
    #[serde(default)]
    #[validate(length(max = 1024))]
    pub user_agent: Option<String>,
    #[serde(default, alias = "page_url")]
    #[validate(length(max = 2048))]
    pub url: Option<String>,
    #[serde(default, alias = "title")]
    #[validate(length(max = 1024))]
    pub page_title: Option<String>,
    #[serde(default)]
    #[validate(length(max = 2048))]
    pub referrer: Option<String>,
    #[serde(default)]
    #[validate(length(max = 45))]
    pub ip_address: Option<String>,
    #[serde(default)]
    #[validate(length(max = 128))]
    pub session_id: Option<String>,
    #[serde(default)]
    #[validate(length(max = 128))]
    pub visitor_id: Option<String>,
    #[serde(default)]
    #[validate(length(max = 35))]
    pub language: Option<String>,
    #[serde(default)]
    #[validate(length(max = 64))]
    pub timezone: Option<String>,
    #[serde(default, alias = "custom_parameters")]
    pub custom_params: Option<CustomParameters>,
}

impl TrackEventInput {
    /// Field-level validation. `app_id` must be present and non-blank.
    pub fn check(&self) -> Result<()> {
        let mut details = match self.validate() {
            Ok(()) => Vec::new(),
            Err(errors) => match Error::from(errors) {
                Error::Validation { details, .. } => details,
                other => return Err(other),
            },
        };
        if self.app_id.as_deref().map_or(true, |id| id.trim().is_empty()) {
            details.insert(0, "app_id: is required".to_string());
        }
        if details.is_empty() {
            Ok(())
        } else {
            Err(Error::validation_with_details("Validation failed", details))
        }
    }

    /// Split pixel query parameters into known event fields and extras.
    ///
    /// Unknown keys become string-valued custom parameters, capped in number.
    pub fn from_pixel_query(mut query: BTreeMap<String, String>) -> Result<Self> {
        let mut take = |key: &str| query.remove(key).filter(|v| !v.is_empty());

        let mut input = Self {
            app_id: take("app_id"),
            session_id: take("session_id"),
            visitor_id: take("visitor_id"),
            url: take("url"),
            page_title: take("title"),
            referrer: take("referrer"),
            language: take("language"),
            timezone: take("timezone"),
            ..Default::default()
        };

        // Cache busters carry no information.
        query.remove("_");
        query.remove("t");

        if !query.is_empty() {
            let extras: BTreeMap<String, String> = query
                .into_iter()
                .take(MAX_PIXEL_EXTRA_PARAMS)
                .collect();
            input.custom_params = Some(CustomParameters::from_pairs(&extras)?);
        }
        Ok(input)
    }
}

/// Half-open interval `[start, end)` over event timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeRange {
    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts >= self.start && ts < self.end
    }
}
