//! Application lifecycle through the HTTP surface.

use axum::http::StatusCode;
use integration_tests::{fixtures, setup::TestContext};
use serde_json::{json, Value};

#[tokio::test]
async fn test_create_returns_full_key() {
    let ctx = TestContext::new();
    let server = ctx.server();

    let response = server
        .post("/v1/applications")
        .json(&fixtures::create_application_body("Storefront"))
        .await;
    response.assert_status(StatusCode::CREATED);

    let body: Value = response.json();
    assert_eq!(body["success"], true);
    let data = &body["data"];
    let app_id = data["app_id"].as_str().unwrap();
    let api_key = data["api_key"].as_str().unwrap();
    assert!(!app_id.is_empty());
    assert!(api_key.len() >= 32);
    assert_eq!(data["domain"], "storefront.example.com");
    assert_eq!(data["active"], true);

    // the returned key authenticates
    server
        .post("/v1/tracking/track")
        .add_header("X-API-Key", api_key)
        .json(&fixtures::track_body(app_id))
        .await
        .assert_status_ok();
}

#[tokio::test]
async fn test_create_validation() {
    let ctx = TestContext::new();
    let server = ctx.server();

    for body in [
        json!({ "name": "", "domain": "shop.example.com" }),
        json!({ "name": "Shop", "domain": "not a domain" }),
        json!({ "name": "Shop" }),
    ] {
        let response = server.post("/v1/applications").json(&body).await;
        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<Value>()["error"]["code"], "VALIDATION_FAILED");
    }
    assert_eq!(ctx.apps.lookups(), 0);
}

#[tokio::test]
async fn test_get_masks_key() {
    let ctx = TestContext::new();
    let app = ctx.register("Shop");
    let server = ctx.server();

    let response = server.get(&format!("/v1/applications/{}", app.app_id)).await;
    response.assert_status_ok();
    let data = &response.json::<Value>()["data"];
    assert_eq!(data["app_id"], app.app_id.as_str());
    assert_eq!(data["status"], "active");
    assert!(data.get("api_key").is_none());
    assert_ne!(data["api_key_hint"], app.api_key.as_str());

    let response = server.get("/v1/applications/app_missing").await;
    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(response.json::<Value>()["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_list_pagination() {
    let ctx = TestContext::new();
    for name in ["One", "Two", "Three"] {
        ctx.register(name);
    }
    let server = ctx.server();

    let first: Value = server
        .get("/v1/applications")
        .add_query_param("limit", 2)
        .await
        .json();
    let data = &first["data"];
    assert_eq!(data["applications"].as_array().unwrap().len(), 2);
    assert_eq!(data["pagination"]["page"], 1);
    assert_eq!(data["pagination"]["limit"], 2);
    assert_eq!(data["pagination"]["total"], 3);
    assert_eq!(data["pagination"]["total_pages"], 2);
    assert!(data["applications"][0].get("api_key").is_none());

    let second: Value = server
        .get("/v1/applications")
        .add_query_param("limit", 2)
        .add_query_param("page", 2)
        .await
        .json();
    assert_eq!(second["data"]["applications"].as_array().unwrap().len(), 1);

    server
        .get("/v1/applications")
        .add_query_param("page", "first")
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update() {
    let ctx = TestContext::new();
    let app = ctx.register("Shop");
    let server = ctx.server();
    let path = format!("/v1/applications/{}", app.app_id);

    let response = server
        .put(&path)
        .json(&json!({ "name": "Renamed", "domain": "Renamed.Example.com" }))
        .await;
    response.assert_status_ok();
    let data = &response.json::<Value>()["data"];
    assert_eq!(data["name"], "Renamed");
    assert_eq!(data["domain"], "renamed.example.com");

    server
        .put(&path)
        .json(&json!({}))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    server
        .put(&path)
        .json(&json!({ "name": "  " }))
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    server
        .put("/v1/applications/app_missing")
        .json(&json!({ "name": "X" }))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_deactivation_invalidates_cached_key() {
    let ctx = TestContext::new();
    let app = ctx.register("Shop");
    let server = ctx.server();

    // first request caches the key lookup
    server
        .post("/v1/tracking/track")
        .add_header("X-API-Key", app.api_key.as_str())
        .json(&fixtures::track_body(&app.app_id))
        .await
        .assert_status_ok();

    server
        .put(&format!("/v1/applications/{}", app.app_id))
        .json(&json!({ "active": false }))
        .await
        .assert_status_ok();

    let response = server
        .post("/v1/tracking/track")
        .add_header("X-API-Key", app.api_key.as_str())
        .json(&fixtures::track_body(&app.app_id))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
    assert_eq!(response.json::<Value>()["error"]["code"], "APPLICATION_INACTIVE");

    let view: Value = server
        .get(&format!("/v1/applications/{}", app.app_id))
        .await
        .json();
    assert_eq!(view["data"]["status"], "inactive");
}

#[tokio::test]
async fn test_regenerate_rotates_key() {
    let ctx = TestContext::new();
    let app = ctx.register("Shop");
    let server = ctx.server();

    server
        .post("/v1/tracking/track")
        .add_header("X-API-Key", app.api_key.as_str())
        .json(&fixtures::track_body(&app.app_id))
        .await
        .assert_status_ok();

    let response = server
        .post(&format!("/v1/applications/{}/api-key/regenerate", app.app_id))
        .await;
    response.assert_status_ok();
    let data = &response.json::<Value>()["data"];
    assert_eq!(data["app_id"], app.app_id.as_str());
    let new_key = data["new_api_key"].as_str().unwrap().to_string();
    assert_ne!(new_key, app.api_key);

    let response = server
        .post("/v1/tracking/track")
        .add_header("X-API-Key", app.api_key.as_str())
        .json(&fixtures::track_body(&app.app_id))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["error"]["code"], "INVALID_API_KEY");

    server
        .post("/v1/tracking/track")
        .add_header("X-API-Key", new_key.as_str())
        .json(&fixtures::track_body(&app.app_id))
        .await
        .assert_status_ok();

    server
        .post("/v1/applications/app_missing/api-key/regenerate")
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete() {
    let ctx = TestContext::new();
    let app = ctx.register("Shop");
    let server = ctx.server();
    let path = format!("/v1/applications/{}", app.app_id);

    // warm the id cache
    server.get(&path).await.assert_status_ok();

    let response = server.delete(&path).await;
    response.assert_status_ok();
    let data = &response.json::<Value>()["data"];
    assert_eq!(data["deleted"], true);
    assert_eq!(data["app_id"], app.app_id.as_str());

    server.get(&path).await.assert_status(StatusCode::NOT_FOUND);
    server.delete(&path).await.assert_status(StatusCode::NOT_FOUND);
    server
        .post("/v1/tracking/track")
        .add_header("X-API-Key", app.api_key.as_str())
        .json(&fixtures::track_body(&app.app_id))
        .await
        .assert_status(StatusCode::UNAUTHORIZED);
}
