//! Size and range limits for the tracker.
//!
//! The `#[validate]` derive macro requires literal values in attributes,
//! so the application field limits are duplicated there. Keep both in sync
//! when modifying.

// === Application Limits ===

/// Application display name max length (chars).
pub const MAX_APP_NAME_LEN: usize = 255;

/// Application domain max length (RFC 1035 presentation form).
pub const MAX_DOMAIN_LEN: usize = 253;

/// Application description max length (chars).
pub const MAX_DESCRIPTION_LEN: usize = 2000;

/// Application ID max length. IDs are `app_` plus 32 hex chars.
pub const MAX_APP_ID_LEN: usize = 64;

// === Event Limits ===

/// Maximum encoded size of an event's custom parameters (64KB).
pub const MAX_CUSTOM_PARAMETERS_BYTES: usize = 64 * 1024;

/// Maximum tracking request body (custom parameters plus envelope fields).
pub const MAX_TRACK_BODY_BYTES: usize = 96 * 1024;

/// Page URL / referrer max length.
pub const MAX_URL_LEN: usize = 2048;

/// Page title max length.
pub const MAX_TITLE_LEN: usize = 1024;

/// User agent string max length.
pub const MAX_USER_AGENT_LEN: usize = 1024;

/// Session / visitor identifier max length.
pub const MAX_IDENTIFIER_LEN: usize = 128;

/// IP address max length (IPv6 = 45 chars).
pub const MAX_IP_LEN: usize = 45;

/// Language tag max length.
pub const MAX_LANGUAGE_LEN: usize = 35;

/// Timezone identifier max length.
pub const MAX_TIMEZONE_LEN: usize = 64;

/// Pixel query parameters folded into custom parameters.
pub const MAX_PIXEL_EXTRA_PARAMS: usize = 32;

// === Listing Limits ===

/// Default page size for list endpoints.
pub const DEFAULT_PAGE_LIMIT: u32 = 50;

/// Maximum page size for list endpoints.
pub const MAX_PAGE_LIMIT: u32 = 1000;

// === Statistics Limits ===

/// Default number of entries in each top-N list.
pub const DEFAULT_TOP_N: u32 = 10;

/// Maximum number of entries in each top-N list.
pub const MAX_TOP_N: u32 = 100;

/// Longest statistics period in days.
pub const MAX_STATS_PERIOD_DAYS: i64 = 400;
