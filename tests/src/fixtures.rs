//! Test fixtures and event generators.

use chrono::{DateTime, Utc};
use serde_json::json;
use tracker_core::{Application, CreateApplication, CustomParameters, TrackingEvent};
use uuid::Uuid;

pub const DESKTOP_UA: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub const BOT_UA: &str = "Mozilla/5.0 (compatible; Googlebot/2.1; +http://www.google.com/bot.html)";

/// A new, active application with a generated ID and key.
pub fn application(name: &str) -> Application {
    Application::new(CreateApplication {
        name: name.to_string(),
        description: Some(format!("{} test site", name)),
        domain: format!("{}.example.com", name.to_ascii_lowercase()),
    })
}

pub fn inactive_application(name: &str) -> Application {
    let mut app = application(name);
    app.active = false;
    app
}

/// JSON body for `POST /v1/applications`.
pub fn create_application_body(name: &str) -> serde_json::Value {
    json!({
        "name": name,
        "description": "Integration test application",
        "domain": format!("{}.example.com", name.to_ascii_lowercase()),
    })
}

/// JSON body for `POST /v1/tracking/track`.
pub fn track_body(app_id: &str) -> serde_json::Value {
    json!({
        "app_id": app_id,
        "url": "https://shop.example.com/products/42",
        "page_title": "Product 42",
        "referrer": "https://www.google.com/",
        "session_id": Uuid::new_v4().to_string(),
        "visitor_id": Uuid::new_v4().to_string(),
        "language": "en-US",
        "timezone": "Europe/Paris",
        "custom_params": { "plan": "pro", "cart_items": 3 }
    })
}

/// A stored event at a fixed instant.
pub fn event_at(
    app_id: &str,
    timestamp: DateTime<Utc>,
    session_id: &str,
    visitor_id: &str,
    page_url: &str,
) -> TrackingEvent {
    TrackingEvent {
        id: Uuid::new_v4().to_string(),
        app_id: app_id.to_string(),
        session_id: session_id.to_string(),
        visitor_id: visitor_id.to_string(),
        page_url: page_url.to_string(),
        page_title: None,
        referrer: None,
        user_agent: DESKTOP_UA.to_string(),
        ip_address: "203.0.113.10".to_string(),
        country: None,
        region: None,
        city: None,
        device_type: Some("desktop".to_string()),
        browser: Some("Chrome".to_string()),
        os: Some("Windows 10".to_string()),
        language: None,
        timezone: None,
        custom_parameters: CustomParameters::empty(),
        timestamp,
        created_at: timestamp,
    }
}
