//! Storage-insert and deletion webhooks.

mod helpers;

use helpers::{
    config_with, png, setup_test_app, setup_test_app_with, RecordingForwarder, PROCESSED, RAW,
};
use proofsheet_core::{Config, ProcessingTrigger};
use serde_json::{json, Value};
use std::sync::Arc;

fn insert_event(bucket: &str, name: &str) -> Value {
    json!({
        "type": "INSERT",
        "table": "objects",
        "schema": "storage",
        "record": { "name": name, "bucket_id": bucket }
    })
}

async fn recording_app(config: Config) -> (helpers::TestApp, Arc<RecordingForwarder>) {
    let forwarder = Arc::new(RecordingForwarder::default());
    let app = setup_test_app_with(config, Some(forwarder.clone() as Arc<dyn ProcessingTrigger>)).await;
    (app, forwarder)
}

#[tokio::test]
async fn test_storage_insert_forwards_and_accepts() {
    let (app, forwarder) = recording_app(Config::in_memory()).await;

    let response = app
        .client()
        .post("/webhooks/storage")
        .json(&insert_event(RAW, "projects/p/designs/d/versions/v/a.png"))
        .await;

    assert_eq!(response.status_code(), 202);
    let body: Value = response.json();
    assert_eq!(body["status"], "accepted");
    assert_eq!(
        forwarder.wait_for_calls(1).await,
        vec!["projects/p/designs/d/versions/v/a.png".to_string()]
    );
}

#[tokio::test]
async fn test_storage_insert_ignores_other_buckets_and_events() {
    let (app, forwarder) = recording_app(Config::in_memory()).await;

    let other_bucket = app
        .client()
        .post("/webhooks/storage")
        .json(&insert_event(PROCESSED, "projects/p/a_200.webp"))
        .await;
    assert_eq!(other_bucket.status_code(), 200);
    let body: Value = other_bucket.json();
    assert_eq!(body["status"], "ignored");

    let update = app
        .client()
        .post("/webhooks/storage")
        .json(&json!({
            "type": "UPDATE",
            "table": "objects",
            "record": { "name": "projects/p/a.png", "bucket_id": RAW }
        }))
        .await;
    assert_eq!(update.status_code(), 200);

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    assert!(forwarder.paths().is_empty());
}

#[tokio::test]
async fn test_storage_insert_without_record_is_400() {
    let (app, _) = recording_app(Config::in_memory()).await;

    let response = app
        .client()
        .post("/webhooks/storage")
        .json(&json!({ "type": "INSERT", "table": "objects" }))
        .await;

    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_storage_insert_runs_generator_in_process() {
    let app = setup_test_app().await;
    let original = "projects/p/designs/d/versions/v/b.png";
    app.put_raw(original, png(300, 300)).await;

    let response = app
        .client()
        .post("/webhooks/storage")
        .json(&insert_event(RAW, original))
        .await;

    assert_eq!(response.status_code(), 202);
    assert!(
        app.wait_for_object(PROCESSED, "projects/p/designs/d/versions/v/b_200.webp")
            .await
    );
}

#[tokio::test]
async fn test_webhook_secret_is_enforced() {
    let config = config_with(|c| c.webhook_secret = Some("hook-secret".to_string()));
    let (app, forwarder) = recording_app(config).await;
    let event = insert_event(RAW, "projects/p/a.png");

    let missing = app.client().post("/webhooks/storage").json(&event).await;
    assert_eq!(missing.status_code(), 401);

    let wrong = app
        .client()
        .post("/webhooks/storage")
        .add_header("x-webhook-secret", "nope")
        .json(&event)
        .await;
    assert_eq!(wrong.status_code(), 401);

    let deletion = app
        .client()
        .post("/webhooks/deletion")
        .json(&json!({ "type": "DELETE", "table": "projects", "old_record": { "id": "p" } }))
        .await;
    assert_eq!(deletion.status_code(), 401);

    let ok = app
        .client()
        .post("/webhooks/storage")
        .add_header("x-webhook-secret", "hook-secret")
        .json(&event)
        .await;
    assert_eq!(ok.status_code(), 202);
    assert_eq!(forwarder.wait_for_calls(1).await.len(), 1);
}

#[tokio::test]
async fn test_health_is_not_behind_webhook_secret() {
    let config = config_with(|c| c.webhook_secret = Some("hook-secret".to_string()));
    let app = setup_test_app_with(config, None).await;

    let response = app.client().get("/health").await;
    assert_eq!(response.status_code(), 200);
}

#[tokio::test]
async fn test_design_deletion_cleans_only_its_prefix() {
    let app = setup_test_app().await;
    app.put(RAW, "projects/P/designs/D/versions/v/a.png").await;
    app.put(RAW, "projects/P/designs/D/versions/v/b.png").await;
    app.put(PROCESSED, "projects/P/designs/D/versions/v/a_200.webp").await;
    app.put(RAW, "projects/P/designs/D2/versions/v/c.png").await;
    app.put(PROCESSED, "projects/P/designs/DD/versions/v/c_200.webp").await;

    let response = app
        .client()
        .post("/webhooks/deletion")
        .json(&json!({
            "type": "DELETE",
            "table": "designs",
            "old_record": { "id": "D", "project_id": "P" }
        }))
        .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["prefix"], "projects/P/designs/D/");
    let deleted: u64 = body["buckets"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["deleted"].as_u64().unwrap())
        .sum();
    assert_eq!(deleted, 3);

    assert!(!app.exists(RAW, "projects/P/designs/D/versions/v/a.png").await);
    assert!(!app.exists(PROCESSED, "projects/P/designs/D/versions/v/a_200.webp").await);
    assert!(app.exists(RAW, "projects/P/designs/D2/versions/v/c.png").await);
    assert!(app.exists(PROCESSED, "projects/P/designs/DD/versions/v/c_200.webp").await);
}

#[tokio::test]
async fn test_project_deletion_cleans_all_designs() {
    let app = setup_test_app().await;
    app.put(RAW, "projects/P/designs/D/versions/v/a.png").await;
    app.put(PROCESSED, "projects/P/designs/E/versions/v/b_800.webp").await;
    app.put(RAW, "projects/Q/designs/D/versions/v/a.png").await;

    let response = app
        .client()
        .post("/webhooks/deletion")
        .json(&json!({ "type": "DELETE", "table": "projects", "old_record": { "id": "P" } }))
        .await;

    assert_eq!(response.status_code(), 200);
    assert!(!app.exists(RAW, "projects/P/designs/D/versions/v/a.png").await);
    assert!(!app.exists(PROCESSED, "projects/P/designs/E/versions/v/b_800.webp").await);
    assert!(app.exists(RAW, "projects/Q/designs/D/versions/v/a.png").await);
}

#[tokio::test]
async fn test_deletion_of_empty_prefix_succeeds() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post("/webhooks/deletion")
        .json(&json!({ "type": "DELETE", "table": "projects", "old_record": { "id": "nothing-here" } }))
        .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert!(body["buckets"]
        .as_array()
        .unwrap()
        .iter()
        .all(|b| b["deleted"] == 0));
}

#[tokio::test]
async fn test_design_deletion_without_project_is_400() {
    let app = setup_test_app().await;

    let response = app
        .client()
        .post("/webhooks/deletion")
        .json(&json!({ "type": "DELETE", "table": "designs", "old_record": { "id": "D" } }))
        .await;

    assert_eq!(response.status_code(), 400);
}

#[tokio::test]
async fn test_deletion_of_other_tables_is_ignored() {
    let app = setup_test_app().await;
    app.put(RAW, "projects/P/designs/D/versions/v/a.png").await;

    let response = app
        .client()
        .post("/webhooks/deletion")
        .json(&json!({ "type": "DELETE", "table": "variations", "old_record": { "id": "P" } }))
        .await;

    assert_eq!(response.status_code(), 200);
    let body: Value = response.json();
    assert_eq!(body["status"], "ignored");
    assert!(app.exists(RAW, "projects/P/designs/D/versions/v/a.png").await);
}
