//! End-to-end tests for the tracking API.
//!
//! POST /v1/tracking/track → ingestion service → event store, then the
//! tenant-scoped read endpoints over what was written.

use axum::http::StatusCode;
use integration_tests::{fixtures, setup::TestContext};
use serde_json::Value;
use std::time::Duration;
use tracker_api::ApiConfig;

#[tokio::test]
async fn test_track_persists_enriched_event() {
    let ctx = TestContext::new();
    let app = ctx.register("Shop");
    let server = ctx.server();

    let response = server
        .post("/v1/tracking/track")
        .add_header("X-API-Key", app.api_key.as_str())
        .add_header("User-Agent", fixtures::DESKTOP_UA)
        .add_header("X-Forwarded-For", "203.0.113.7, 10.0.0.1")
        .add_header("CF-IPCountry", "fr")
        .json(&fixtures::track_body(&app.app_id))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["success"], true);
    assert!(body["error"].is_null());
    assert!(body["timestamp"].is_string());
    let tracking_id = body["data"]["tracking_id"].as_str().unwrap().to_string();
    assert!(body["data"]["timestamp"].is_string());

    let stored = ctx.events.all();
    assert_eq!(stored.len(), 1);
    let event = &stored[0];
    assert_eq!(event.id, tracking_id);
    assert_eq!(event.app_id, app.app_id);
    assert_eq!(event.page_url, "https://shop.example.com/products/42");
    assert_eq!(event.ip_address, "203.0.113.7");
    assert_eq!(event.user_agent, fixtures::DESKTOP_UA);
    assert_eq!(event.browser.as_deref(), Some("Chrome"));
    assert_eq!(event.device_type.as_deref(), Some("desktop"));
    assert_eq!(event.country.as_deref(), Some("FR"));
    assert_eq!(event.language.as_deref(), Some("en-US"));

    let params = event.custom_parameters.to_value().unwrap();
    assert_eq!(params["plan"], "pro");
    assert_eq!(params["cart_items"], 3);
}

#[tokio::test]
async fn test_event_reads_are_tenant_scoped() {
    let ctx = TestContext::new();
    let shop = ctx.register("Shop");
    let blog = ctx.register("Blog");
    let server = ctx.server();

    let mut body = fixtures::track_body(&shop.app_id);
    body["session_id"] = Value::from("session-1");
    let first: Value = server
        .post("/v1/tracking/track")
        .add_header("X-API-Key", shop.api_key.as_str())
        .json(&body)
        .await
        .json();
    server
        .post("/v1/tracking/track")
        .add_header("X-API-Key", shop.api_key.as_str())
        .json(&body)
        .await
        .assert_status_ok();
    let id = first["data"]["tracking_id"].as_str().unwrap();

    // single event
    let response = server
        .get(&format!("/v1/tracking/events/{}", id))
        .add_header("X-API-Key", shop.api_key.as_str())
        .await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["data"]["id"], id);

    // another tenant cannot see it
    let response = server
        .get(&format!("/v1/tracking/events/{}", id))
        .add_header("X-API-Key", blog.api_key.as_str())
        .await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(response.json::<Value>()["error"]["code"], "NOT_FOUND");

    // session, oldest first
    let session: Value = server
        .get("/v1/tracking/sessions/session-1")
        .add_header("X-API-Key", shop.api_key.as_str())
        .await
        .json();
    assert_eq!(session["data"]["count"], 2);
    assert_eq!(session["data"]["events"][0]["id"], id);

    // listing and count
    let list: Value = server
        .get("/v1/tracking/events?limit=1")
        .add_header("X-API-Key", shop.api_key.as_str())
        .await
        .json();
    assert_eq!(list["data"]["count"], 1);
    assert_eq!(list["data"]["limit"], 1);

    let count: Value = server
        .get("/v1/tracking/count")
        .add_header("X-API-Key", shop.api_key.as_str())
        .await
        .json();
    assert_eq!(count["data"]["count"], 2);

    let count: Value = server
        .get("/v1/tracking/count")
        .add_header("X-API-Key", blog.api_key.as_str())
        .await
        .json();
    assert_eq!(count["data"]["count"], 0);

    // naming another tenant's app_id is forbidden
    let response = server
        .get(&format!("/v1/tracking/count?app_id={}", shop.app_id))
        .add_header("X-API-Key", blog.api_key.as_str())
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_bulk_delete_in_window() {
    let ctx = TestContext::new();
    let app = ctx.register("Shop");
    let server = ctx.server();

    let day = |d: u32, h: u32| {
        chrono::TimeZone::with_ymd_and_hms(&chrono::Utc, 2024, 3, d, h, 0, 0).unwrap()
    };
    for (d, h) in [(1, 10), (2, 10), (3, 10)] {
        ctx.events.insert(fixtures::event_at(
            &app.app_id,
            day(d, h),
            "s",
            "v",
            "https://shop.example.com/",
        ));
    }

    let response = server
        .delete("/v1/tracking/events?start_date=2024-03-01&end_date=2024-03-02")
        .add_header("X-API-Key", app.api_key.as_str())
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["deleted"], 2);
    assert_eq!(ctx.events.len(), 1);

    // both bounds are required
    let response = server
        .delete("/v1/tracking/events?start_date=2024-03-01")
        .add_header("X-API-Key", app.api_key.as_str())
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"]["code"], "VALIDATION_FAILED");
}

#[tokio::test]
async fn test_time_range_listing() {
    let ctx = TestContext::new();
    let app = ctx.register("Shop");
    let server = ctx.server();

    let at = |h: u32| chrono::TimeZone::with_ymd_and_hms(&chrono::Utc, 2024, 3, 1, h, 0, 0).unwrap();
    for h in [8, 12, 20] {
        ctx.events.insert(fixtures::event_at(
            &app.app_id,
            at(h),
            "s",
            "v",
            &format!("https://shop.example.com/{}", h),
        ));
    }

    let body: Value = server
        .get("/v1/tracking/events?start_date=2024-03-01T10:00:00Z&end_date=2024-03-01T20:00:00Z")
        .add_header("X-API-Key", app.api_key.as_str())
        .await
        .json();
    let urls: Vec<&str> = body["data"]["events"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["page_url"].as_str().unwrap())
        .collect();
    assert_eq!(
        urls,
        vec!["https://shop.example.com/20", "https://shop.example.com/12"]
    );
}

#[tokio::test]
async fn test_store_outage_is_generic_500() {
    let ctx = TestContext::new();
    let app = ctx.register("Shop");
    let server = ctx.server();

    ctx.events.set_should_fail(true);
    let response = server
        .post("/v1/tracking/track")
        .add_header("X-API-Key", app.api_key.as_str())
        .json(&fixtures::track_body(&app.app_id))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "STORE_UNAVAILABLE");
    assert!(!body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("memory store"));
}

#[tokio::test]
async fn test_unparseable_forwarded_for_is_not_stored() {
    let ctx = TestContext::new();
    let app = ctx.register("Shop");
    let server = ctx.server();

    server
        .post("/v1/tracking/track")
        .add_header("X-API-Key", app.api_key.as_str())
        .add_header("X-Forwarded-For", "x".repeat(200))
        .add_header("X-Real-IP", "198.51.100.9")
        .json(&fixtures::track_body(&app.app_id))
        .await
        .assert_status_ok();

    server
        .post("/v1/tracking/track")
        .add_header("X-API-Key", app.api_key.as_str())
        .add_header("X-Forwarded-For", "x".repeat(200))
        .json(&fixtures::track_body(&app.app_id))
        .await
        .assert_status_ok();

    let mut ips: Vec<String> = ctx.events.all().into_iter().map(|e| e.ip_address).collect();
    ips.sort();
    assert_eq!(ips, vec!["".to_string(), "198.51.100.9".to_string()]);
}

#[tokio::test]
async fn test_id_collision_is_retried_once() {
    let ctx = TestContext::new();
    let app = ctx.register("Shop");
    let server = ctx.server();

    ctx.events.collide_next(1);
    let response = server
        .post("/v1/tracking/track")
        .add_header("X-API-Key", app.api_key.as_str())
        .json(&fixtures::track_body(&app.app_id))
        .await;
    response.assert_status_ok();
    let body: Value = response.json();
    let stored = ctx.events.all();
    assert_eq!(stored.len(), 1);
    assert_eq!(body["data"]["tracking_id"], stored[0].id.as_str());

    // a second collision in a row is not retried again
    ctx.events.collide_next(2);
    let response = server
        .post("/v1/tracking/track")
        .add_header("X-API-Key", app.api_key.as_str())
        .json(&fixtures::track_body(&app.app_id))
        .await;
    response.assert_status(StatusCode::CONFLICT);
    assert_eq!(response.json::<Value>()["error"]["code"], "DUPLICATE");
    assert_eq!(ctx.events.len(), 1);
}

#[tokio::test]
async fn test_slow_store_answers_request_timeout() {
    let mut config = ApiConfig::default();
    config.timeouts.tracking_secs = 1;
    let ctx = TestContext::with_config(config);
    let app = ctx.register("Shop");
    let server = ctx.server();

    ctx.events.set_write_delay(Some(Duration::from_secs(3)));
    let response = server
        .post("/v1/tracking/track")
        .add_header("X-API-Key", app.api_key.as_str())
        .json(&fixtures::track_body(&app.app_id))
        .await;

    response.assert_status(StatusCode::REQUEST_TIMEOUT);
    let body: Value = response.json();
    assert_eq!(body["success"], false);
    assert!(body["data"].is_null());
    assert_eq!(body["error"]["code"], "REQUEST_TIMEOUT");
    assert!(body["timestamp"].is_string());
    assert!(response.headers().contains_key("x-request-id"));
    assert!(ctx.events.is_empty());
}
