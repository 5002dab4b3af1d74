//! Statistics endpoint: rollups, bucketing, caching, and failures.

use axum::http::StatusCode;
use chrono::{TimeZone, Utc};
use integration_tests::{fixtures, setup::TestContext};
use serde_json::Value;
use tracker_core::Application;

/// Three events for `app` over two days, plus noise for `other`.
fn seed(ctx: &TestContext, app: &Application, other: &Application) {
    let events = [
        (Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(), "s1", "v1", "https://shop.example.com/"),
        (Utc.with_ymd_and_hms(2024, 3, 1, 10, 30, 0).unwrap(), "s1", "v1", "https://shop.example.com/cart"),
        (Utc.with_ymd_and_hms(2024, 3, 2, 9, 0, 0).unwrap(), "s2", "v2", "https://shop.example.com/"),
    ];
    for (ts, session, visitor, url) in events {
        ctx.events
            .insert(fixtures::event_at(&app.app_id, ts, session, visitor, url));
    }
    ctx.events.insert(fixtures::event_at(
        &other.app_id,
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        "s9",
        "v9",
        "https://blog.example.com/",
    ));
}

#[tokio::test]
async fn test_daily_rollup() {
    let ctx = TestContext::new();
    let shop = ctx.register("Shop");
    let blog = ctx.register("Blog");
    seed(&ctx, &shop, &blog);
    let server = ctx.server();

    let response = server
        .get("/v1/tracking/statistics")
        .add_header("X-API-Key", shop.api_key.as_str())
        .add_query_param("start_date", "2024-03-01")
        .add_query_param("end_date", "2024-03-02")
        .add_query_param("group_by", "day")
        .await;
    response.assert_status_ok();

    let data = &response.json::<Value>()["data"];
    assert_eq!(data["app_id"], shop.app_id.as_str());
    assert_eq!(data["start_date"], "2024-03-01");
    assert_eq!(data["end_date"], "2024-03-02");
    assert_eq!(data["group_by"], "day");
    assert_eq!(data["total_requests"], 3);
    assert_eq!(data["unique_visitors"], 2);
    assert_eq!(data["unique_sessions"], 2);
    assert_eq!(data["average_session_duration"].as_f64().unwrap(), 900.0);

    let series = data["time_series"].as_array().unwrap();
    assert_eq!(series.len(), 2);
    assert_eq!(series[0]["count"], 2);
    assert_eq!(series[1]["count"], 1);

    let pages = data["top_pages"].as_array().unwrap();
    assert_eq!(pages[0]["value"], "https://shop.example.com/");
    assert_eq!(pages[0]["count"], 2);
    assert_eq!(pages[1]["count"], 1);
    assert_eq!(data["top_user_agents"][0]["value"], fixtures::DESKTOP_UA);
}

#[tokio::test]
async fn test_hourly_buckets_are_dense() {
    let ctx = TestContext::new();
    let shop = ctx.register("Shop");
    let blog = ctx.register("Blog");
    seed(&ctx, &shop, &blog);
    let server = ctx.server();

    let data = server
        .get("/v1/tracking/statistics")
        .add_header("X-API-Key", shop.api_key.as_str())
        .add_query_param("start_date", "2024-03-01")
        .add_query_param("end_date", "2024-03-01")
        .add_query_param("group_by", "hour")
        .await
        .json::<Value>()["data"]
        .clone();

    let series = data["time_series"].as_array().unwrap();
    assert_eq!(series.len(), 24);
    assert_eq!(series[10]["count"], 2);
    let total: u64 = series.iter().map(|b| b["count"].as_u64().unwrap()).sum();
    assert_eq!(total, 2);
}

#[tokio::test]
async fn test_invalid_queries() {
    let ctx = TestContext::new();
    let shop = ctx.register("Shop");
    let blog = ctx.register("Blog");
    let server = ctx.server();

    let cases: [&[(&str, &str)]; 4] = [
        &[("start_date", "2024-03-05"), ("end_date", "2024-03-01")],
        &[("start_date", "March 1st")],
        &[("start_date", "2024-03-01"), ("end_date", "2024-03-02"), ("group_by", "week")],
        &[("start_date", "2020-01-01"), ("end_date", "2024-03-02")],
    ];
    for params in cases {
        let mut request = server
            .get("/v1/tracking/statistics")
            .add_header("X-API-Key", shop.api_key.as_str());
        for (key, value) in params {
            request = request.add_query_param(key, value);
        }
        let response = request.await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["error"]["code"], "VALIDATION_FAILED");
    }

    // another tenant's statistics
    let response = server
        .get("/v1/tracking/statistics")
        .add_header("X-API-Key", shop.api_key.as_str())
        .add_query_param("app_id", blog.app_id.as_str())
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_results_are_cached() {
    let ctx = TestContext::new();
    let shop = ctx.register("Shop");
    let blog = ctx.register("Blog");
    seed(&ctx, &shop, &blog);
    let server = ctx.server();

    let fetch = || {
        server
            .get("/v1/tracking/statistics")
            .add_header("X-API-Key", shop.api_key.as_str())
            .add_query_param("start_date", "2024-03-01")
            .add_query_param("end_date", "2024-03-02")
    };

    let first: Value = fetch().await.json();
    assert_eq!(first["data"]["total_requests"], 3);

    ctx.events.insert(fixtures::event_at(
        &shop.app_id,
        Utc.with_ymd_and_hms(2024, 3, 2, 11, 0, 0).unwrap(),
        "s3",
        "v3",
        "https://shop.example.com/",
    ));

    // served from cache within the TTL
    let second: Value = fetch().await.json();
    assert_eq!(second["data"]["total_requests"], 3);

    // a different grouping is a different entry
    let hourly: Value = fetch().add_query_param("group_by", "hour").await.json();
    assert_eq!(hourly["data"]["total_requests"], 4);
}

#[tokio::test]
async fn test_store_failure() {
    let ctx = TestContext::new();
    let shop = ctx.register("Shop");
    let server = ctx.server();

    // authenticate once so the key is cached
    server
        .get("/v1/tracking/count")
        .add_header("X-API-Key", shop.api_key.as_str())
        .await
        .assert_status_ok();

    ctx.events.set_should_fail(true);
    let response = server
        .get("/v1/tracking/statistics")
        .add_header("X-API-Key", shop.api_key.as_str())
        .add_query_param("start_date", "2024-03-01")
        .add_query_param("end_date", "2024-03-02")
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
