//! Postgres repositories against a real server.
//!
//! Requires Docker (or `TRACKER_TEST_DATABASE_HOST`). Run with
//! `cargo test -p integration-tests --test postgres_store -- --ignored`.

use chrono::{Duration, TimeZone, Utc};
use integration_tests::{containers::TestContainers, fixtures};
use tracker_core::stats::compute_statistics;
use tracker_core::{
    ApplicationStore, ErrorCode, EventStore, StatsQuery, TimeRange, UpdateApplication,
};
use tracker_store::{init_schema, PgApplicationStore, PgEventStore, StoreClient};

async fn connect(containers: &TestContainers) -> StoreClient {
    let client = StoreClient::new(containers.database.clone()).expect("Failed to create pool");
    init_schema(&client).await.expect("Failed to create schema");
    // idempotent
    init_schema(&client).await.expect("Schema is not idempotent");
    client
}

#[tokio::test]
#[ignore]
async fn test_application_lifecycle() {
    let containers = TestContainers::start().await;
    let client = connect(&containers).await;
    let store = PgApplicationStore::new(client.clone());

    let created = store.create(fixtures::application("Shop")).await.unwrap();
    let by_id = store.get_by_id(&created.app_id).await.unwrap();
    assert_eq!(by_id.api_key, created.api_key);
    let by_key = store.get_by_api_key(&created.api_key).await.unwrap();
    assert_eq!(by_key.app_id, created.app_id);

    let mut changed = by_id.clone();
    UpdateApplication {
        active: Some(false),
        name: Some("Shop 2".to_string()),
        ..Default::default()
    }
    .apply_to(&mut changed);
    let updated = store.update(&changed).await.unwrap();
    assert!(!updated.active);
    assert_eq!(updated.name, "Shop 2");
    assert_eq!(updated.api_key, created.api_key);

    let rotation = store.regenerate_api_key(&created.app_id).await.unwrap();
    assert_eq!(rotation.old_api_key, created.api_key);
    assert_ne!(rotation.new_api_key, created.api_key);
    let err = store.get_by_api_key(&created.api_key).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotFound);

    let before = store.count().await.unwrap();
    assert!(store.list(10, 0).await.unwrap().iter().any(|a| a.app_id == created.app_id));

    store.delete(&created.app_id).await.unwrap();
    assert_eq!(store.count().await.unwrap(), before - 1);
    let err = store.delete(&created.app_id).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotFound);

    store.ping().await.unwrap();
    client.close().await;
}

#[tokio::test]
#[ignore]
async fn test_duplicate_api_key_rejected() {
    let containers = TestContainers::start().await;
    let client = connect(&containers).await;
    let store = PgApplicationStore::new(client.clone());

    let first = store.create(fixtures::application("One")).await.unwrap();
    let mut second = fixtures::application("Two");
    second.api_key = first.api_key.clone();
    let err = store.create(second).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::Duplicate);

    client.close().await;
}

#[tokio::test]
#[ignore]
async fn test_event_reads_and_deletes() {
    let containers = TestContainers::start().await;
    let client = connect(&containers).await;
    let store = PgEventStore::new(client.clone());
    let app_id = format!("app_{}", uuid::Uuid::new_v4().simple());
    let base = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();

    let mut ids = Vec::new();
    for i in 0..5 {
        let mut event = fixtures::event_at(
            &app_id,
            base + Duration::minutes(i),
            "session-a",
            "visitor-a",
            "https://shop.example.com/",
        );
        event.custom_parameters =
            tracker_core::CustomParameters::from_json(r#"{"step":"checkout"}"#.to_string())
                .unwrap();
        store.create(&event).await.unwrap();
        ids.push(event.id);
    }

    let stored = store.get_by_id(&app_id, &ids[0]).await.unwrap();
    assert_eq!(stored.timestamp, base);
    assert_eq!(stored.custom_parameters.to_value().unwrap()["step"], "checkout");
    let err = store.get_by_id("app_other", &ids[0]).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::NotFound);

    let newest = store.get_by_app_id(&app_id, 2, 0).await.unwrap();
    assert_eq!(newest.len(), 2);
    assert_eq!(newest[0].id, ids[4]);

    let session = store.get_by_session_id(&app_id, "session-a").await.unwrap();
    assert_eq!(session.first().map(|e| e.id.as_str()), Some(ids[0].as_str()));

    let range = TimeRange {
        start: base + Duration::minutes(1),
        end: base + Duration::minutes(3),
    };
    let in_range = store.get_by_time_range(&app_id, range, 100, 0).await.unwrap();
    assert_eq!(in_range.len(), 2);

    assert_eq!(store.delete_by_time_range(&app_id, range).await.unwrap(), 2);
    assert_eq!(store.count_by_app_id(&app_id).await.unwrap(), 3);
    assert_eq!(store.delete_by_app_id(&app_id).await.unwrap(), 3);
    assert_eq!(store.count_by_app_id(&app_id).await.unwrap(), 0);

    client.close().await;
}

#[tokio::test]
#[ignore]
async fn test_sql_statistics_match_in_memory_rollup() {
    let containers = TestContainers::start().await;
    let client = connect(&containers).await;
    let store = PgEventStore::new(client.clone());
    let app_id = format!("app_{}", uuid::Uuid::new_v4().simple());

    let mut events = Vec::new();
    let pages = ["https://a.example/", "https://a.example/x", "https://a.example/y"];
    for i in 0..30i64 {
        let mut event = fixtures::event_at(
            &app_id,
            Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap() + Duration::minutes(i * 97),
            &format!("s{}", i % 4),
            &format!("v{}", i % 3),
            pages[(i % 3) as usize],
        );
        if i % 2 == 0 {
            event.referrer = Some("https://www.google.com/".to_string());
            event.country = Some("DE".to_string());
        }
        store.create(&event).await.unwrap();
        events.push(event);
    }

    for group_by in ["day", "hour"] {
        let query = StatsQuery::parse(
            &app_id,
            Some("2024-04-01"),
            Some("2024-04-03"),
            Some(group_by),
            Some(2),
        )
        .unwrap();

        let sql = store.statistics(&query).await.unwrap();
        let expected = compute_statistics(&query, &events);

        assert_eq!(sql.total_requests, expected.total_requests);
        assert_eq!(sql.unique_visitors, expected.unique_visitors);
        assert_eq!(sql.unique_sessions, expected.unique_sessions);
        assert!((sql.average_session_duration - expected.average_session_duration).abs() < 1e-3);
        assert_eq!(sql.top_pages, expected.top_pages);
        assert_eq!(sql.top_referrers, expected.top_referrers);
        assert_eq!(sql.top_countries, expected.top_countries);
        assert_eq!(sql.time_series, expected.time_series);
    }

    client.close().await;
}
