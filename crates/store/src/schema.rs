//! PostgreSQL table schemas.
//!
//! Two tables: `applications` (tenants) and `tracking` (append-only
//! events). `custom_parameters` is JSONB, written from text and read back
//! as text.

/// Tenants. `api_key` is unique through its own index.
pub const CREATE_APPLICATIONS_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS applications (
    app_id      VARCHAR(64)  PRIMARY KEY,
    api_key     VARCHAR(128) NOT NULL,
    name        VARCHAR(255) NOT NULL,
    description TEXT,
    domain      VARCHAR(253) NOT NULL,
    active      BOOLEAN      NOT NULL DEFAULT TRUE,
    created_at  TIMESTAMPTZ  NOT NULL DEFAULT NOW(),
    updated_at  TIMESTAMPTZ  NOT NULL DEFAULT NOW()
)
"#;

pub const CREATE_APPLICATIONS_API_KEY_INDEX: &str = r#"
CREATE UNIQUE INDEX IF NOT EXISTS idx_applications_api_key ON applications (api_key)
"#;

pub const CREATE_APPLICATIONS_CREATED_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_applications_created_at ON applications (created_at DESC)
"#;

/// Events. `app_id` is not a foreign key; events outlive
/// their tenant until bulk-deleted.
pub const CREATE_TRACKING_TABLE: &str = r#"
CREATE TABLE IF NOT EXISTS tracking (
    id                VARCHAR(64)  PRIMARY KEY,
    app_id            VARCHAR(64)  NOT NULL,
    session_id        VARCHAR(128) NOT NULL DEFAULT '',
    visitor_id        VARCHAR(128) NOT NULL DEFAULT '',
    page_url          TEXT         NOT NULL DEFAULT '',
    page_title        TEXT,
    referrer          TEXT,
    user_agent        TEXT         NOT NULL DEFAULT '',
    ip_address        VARCHAR(45)  NOT NULL DEFAULT '',
    country           VARCHAR(2),
    region            VARCHAR(128),
    city              VARCHAR(128),
    device_type       VARCHAR(16),
    browser           VARCHAR(64),
    os                VARCHAR(64),
    language          VARCHAR(35),
    timezone          VARCHAR(64),
    custom_parameters JSONB        NOT NULL DEFAULT '{}'::jsonb,
    timestamp         TIMESTAMPTZ  NOT NULL,
    created_at        TIMESTAMPTZ  NOT NULL DEFAULT NOW()
)
"#;

pub const CREATE_TRACKING_APP_TIMESTAMP_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_tracking_app_timestamp ON tracking (app_id, timestamp)
"#;

pub const CREATE_TRACKING_SESSION_INDEX: &str = r#"
CREATE INDEX IF NOT EXISTS idx_tracking_session ON tracking (session_id)
"#;

/// All DDL statements in dependency order.
pub fn all_tables() -> Vec<&'static str> {
    vec![
        CREATE_APPLICATIONS_TABLE,
        CREATE_APPLICATIONS_API_KEY_INDEX,
        CREATE_APPLICATIONS_CREATED_INDEX,
        CREATE_TRACKING_TABLE,
        CREATE_TRACKING_APP_TIMESTAMP_INDEX,
        CREATE_TRACKING_SESSION_INDEX,
    ]
}
