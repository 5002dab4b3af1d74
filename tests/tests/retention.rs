//! Retention pass over in-memory stores.

use chrono::{Duration, Utc};
use integration_tests::{fixtures, setup::TestContext};
use std::sync::Arc;
use tracker_core::{ApplicationStore, EventStore};
use tracker_worker::{RetentionConfig, RetentionWorker};

fn worker(ctx: &TestContext, days: u32) -> RetentionWorker {
    RetentionWorker::new(
        ctx.apps.clone() as Arc<dyn ApplicationStore>,
        ctx.events.clone() as Arc<dyn EventStore>,
        RetentionConfig {
            days,
            interval_secs: 60,
        },
    )
}

#[tokio::test]
async fn test_deletes_only_expired_events() {
    let ctx = TestContext::new();
    let shop = ctx.register("Shop");
    let blog = ctx.register("Blog");
    let now = Utc::now();

    for app in [&shop, &blog] {
        ctx.events.insert(fixtures::event_at(
            &app.app_id,
            now - Duration::days(45),
            "old",
            "v1",
            "https://example.com/old",
        ));
        ctx.events.insert(fixtures::event_at(
            &app.app_id,
            now - Duration::days(5),
            "new",
            "v1",
            "https://example.com/new",
        ));
    }
    // events of an application that no longer exists are left alone
    ctx.events.insert(fixtures::event_at(
        "app_gone",
        now - Duration::days(90),
        "gone",
        "v2",
        "https://example.com/",
    ));

    let report = worker(&ctx, 30).run().await.unwrap();
    assert_eq!(report.applications, 2);
    assert_eq!(report.deleted, 2);
    assert_eq!(report.failures, 0);

    let remaining = ctx.events.all();
    assert_eq!(remaining.len(), 3);
    assert!(remaining
        .iter()
        .filter(|e| e.app_id != "app_gone")
        .all(|e| e.session_id == "new"));

    // a second pass finds nothing
    let report = worker(&ctx, 30).run().await.unwrap();
    assert_eq!(report.deleted, 0);
}

#[tokio::test]
async fn test_disabled_is_a_noop() {
    let ctx = TestContext::new();
    let shop = ctx.register("Shop");
    ctx.events.insert(fixtures::event_at(
        &shop.app_id,
        Utc::now() - Duration::days(4000),
        "s",
        "v",
        "https://example.com/",
    ));

    let report = worker(&ctx, 0).run().await.unwrap();
    assert_eq!(report.applications, 0);
    assert_eq!(ctx.events.len(), 1);
}

#[tokio::test]
async fn test_pages_through_all_applications() {
    let ctx = TestContext::new();
    let old = Utc::now() - Duration::days(400);
    for i in 0..120 {
        let app = ctx.register(&format!("Site{}", i));
        ctx.events.insert(fixtures::event_at(
            &app.app_id,
            old,
            "s",
            "v",
            "https://example.com/",
        ));
    }

    let report = worker(&ctx, 365).run().await.unwrap();
    assert_eq!(report.applications, 120);
    assert_eq!(report.deleted, 120);
    assert!(ctx.events.is_empty());
}

#[tokio::test]
async fn test_failures() {
    let ctx = TestContext::new();
    ctx.register("Shop");
    ctx.register("Blog");

    // per-application delete failures are counted, the pass completes
    ctx.events.set_should_fail(true);
    let report = worker(&ctx, 30).run().await.unwrap();
    assert_eq!(report.applications, 2);
    assert_eq!(report.failures, 2);

    // listing failure aborts the pass
    ctx.apps.set_should_fail(true);
    assert!(worker(&ctx, 30).run().await.is_err());
}
