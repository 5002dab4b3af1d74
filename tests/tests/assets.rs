//! Tracker bundle serving and CORS headers.

use axum::http::StatusCode;
use integration_tests::setup::TestContext;
use serde_json::Value;
use tracker_api::{ApiConfig, CorsConfig};

#[tokio::test]
async fn test_tracker_js_etag_revalidation() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server.get("/tracker.js").await;
    response.assert_status_ok();
    let etag = response.headers()["etag"].to_str().unwrap().to_string();
    assert!(etag.starts_with('"') && etag.ends_with('"'));
    assert!(response.headers()["content-type"]
        .to_str()
        .unwrap()
        .starts_with("application/javascript"));
    assert_eq!(response.headers()["cache-control"], "public, max-age=86400");
    assert!(response.text().contains("PRESET_APP_ID"));

    // stable across requests
    let again = server.get("/tracker.js").await;
    assert_eq!(again.headers()["etag"], etag.as_str());

    let cached = server
        .get("/tracker.js")
        .add_header("If-None-Match", etag.as_str())
        .await;
    cached.assert_status(StatusCode::NOT_MODIFIED);
    assert!(cached.as_bytes().is_empty());

    let stale = server
        .get("/tracker.js")
        .add_header("If-None-Match", "\"something-else\"")
        .await;
    stale.assert_status_ok();
}

#[tokio::test]
async fn test_minified_bundle_differs() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let full = server.get("/tracker.js").await;
    let min = server.get("/tracker.min.js").await;
    min.assert_status_ok();
    assert_ne!(full.headers()["etag"], min.headers()["etag"]);
    assert!(min.as_bytes().len() < full.as_bytes().len());
}

#[tokio::test]
async fn test_per_app_bundle() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server.get("/tracker/app_0123abc").await;
    response.assert_status_ok();
    assert!(response
        .text()
        .contains("var PRESET_APP_ID = \"app_0123abc\";"));

    let response = server.get("/tracker/bad.id").await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["error"]["code"], "VALIDATION_FAILED");
}

#[tokio::test]
async fn test_cors_preflight() {
    let ctx = TestContext::with_config(ApiConfig {
        cors: CorsConfig {
            allowed_origins: vec!["https://app.example.com".to_string()],
            parent_domain: Some("customer.test".to_string()),
            ..CorsConfig::default()
        },
        ..ApiConfig::default()
    });
    let server = ctx.server();

    for origin in ["https://app.example.com", "https://www.customer.test"] {
        let response = server
            .method(axum::http::Method::OPTIONS, "/v1/tracking/track")
            .add_header("Origin", origin)
            .add_header("Access-Control-Request-Method", "POST")
            .add_header("Access-Control-Request-Headers", "x-api-key, content-type")
            .await;
        response.assert_status_ok();
        assert_eq!(response.headers()["access-control-allow-origin"], origin);
    }

    let response = server
        .method(axum::http::Method::OPTIONS, "/v1/tracking/track")
        .add_header("Origin", "https://evil.test")
        .add_header("Access-Control-Request-Method", "POST")
        .await;
    assert!(response
        .headers()
        .get("access-control-allow-origin")
        .is_none());
}
