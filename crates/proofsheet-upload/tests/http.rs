use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{post, put};
use axum::{Json, Router};
use bytes::Bytes;
use proofsheet_core::{ProcessingTrigger, TriggerError};
use proofsheet_upload::{
    HttpGrants, HttpProcessingTrigger, HttpTransport, RecordStore, RecordStoreError,
    RestRecordStore, TransferOutcome, UploadGrants, UploadTransport,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Clone, Default)]
struct Received {
    objects: Arc<Mutex<HashMap<String, (String, Bytes)>>>,
}

async fn store_object(
    State(state): State<Received>,
    Path(path): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    state
        .objects
        .lock()
        .unwrap()
        .insert(path, (content_type, body));
    StatusCode::OK
}

async fn denied() -> impl IntoResponse {
    (StatusCode::FORBIDDEN, "signature mismatch")
}

async fn slow() -> StatusCode {
    tokio::time::sleep(Duration::from_secs(10)).await;
    StatusCode::OK
}

async fn process(Json(body): Json<Value>) -> impl IntoResponse {
    let path = body["originalPath"].as_str().unwrap_or_default().to_string();
    match path.as_str() {
        "projects/p/partial.png" => (
            StatusCode::MULTI_STATUS,
            Json(json!({
                "originalPath": path,
                "status": "partial",
                "derivatives": [],
                "failedWidths": [800]
            })),
        ),
        "projects/p/missing.png" => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"error": "download failed"})),
        ),
        _ => (
            StatusCode::OK,
            Json(json!({
                "originalPath": path,
                "status": "complete",
                "derivatives": []
            })),
        ),
    }
}

async fn grant(Json(body): Json<Value>) -> impl IntoResponse {
    let path = body["path"].as_str().unwrap_or_default().to_string();
    if path.contains("..") {
        return (StatusCode::BAD_REQUEST, Json(json!({"error": "bad path"})));
    }
    (
        StatusCode::OK,
        Json(json!({
            "url": format!("https://storage.test/raw/{}?sig=1", path),
            "bucket": "raw",
            "path": path,
            "expires_at": "2030-01-01T00:00:00Z"
        })),
    )
}

fn authorized(headers: &HeaderMap) -> bool {
    headers.get("apikey").and_then(|v| v.to_str().ok()) == Some("secret")
        && headers.get("authorization").and_then(|v| v.to_str().ok()) == Some("Bearer secret")
}

async fn insert_row(headers: HeaderMap, Json(mut row): Json<Value>) -> impl IntoResponse {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"message": "bad key"})));
    }
    row["id"] = json!(Uuid::new_v4());
    (StatusCode::CREATED, Json(json!([row])))
}

async fn patch_row(
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    Json(mut patch): Json<Value>,
) -> impl IntoResponse {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"message": "bad key"})));
    }
    let id = query
        .get("id")
        .and_then(|v| v.strip_prefix("eq."))
        .unwrap_or_default()
        .to_string();
    if id == Uuid::nil().to_string() {
        return (StatusCode::OK, Json(json!([])));
    }
    patch["id"] = json!(id);
    (StatusCode::OK, Json(json!([patch])))
}

async fn delete_row(headers: HeaderMap) -> StatusCode {
    if authorized(&headers) {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::UNAUTHORIZED
    }
}

async fn spawn_server() -> (SocketAddr, Received) {
    let received = Received::default();
    let app = Router::new()
        .route("/upload/{*path}", put(store_object))
        .route("/denied", put(denied))
        .route("/slow", put(slow))
        .route("/process-image", post(process))
        .route("/upload-grants", post(grant))
        .route(
            "/rest/variations",
            post(insert_row).patch(patch_row).delete(delete_row),
        )
        .with_state(received.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, received)
}

fn progress_log() -> (Arc<Mutex<Vec<f32>>>, proofsheet_upload::ProgressFn) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = log.clone();
    (log, Arc::new(move |f| sink.lock().unwrap().push(f)))
}

#[tokio::test]
async fn test_transfer_streams_body_with_monotonic_progress() {
    let (addr, received) = spawn_server().await;
    let transport = HttpTransport::new().unwrap().with_chunk_size(1024);
    let body = Bytes::from(vec![42u8; 10 * 1024]);
    let (log, on_progress) = progress_log();

    let outcome = transport
        .transfer(
            &format!("http://{}/upload/projects/p/a.png", addr),
            body.clone(),
            "image/png",
            on_progress,
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome, TransferOutcome::Completed);
    let objects = received.objects.lock().unwrap();
    let (content_type, stored) = objects.get("projects/p/a.png").unwrap();
    assert_eq!(content_type, "image/png");
    assert_eq!(stored, &body);

    let log = log.lock().unwrap();
    assert!(log.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(log.last().copied(), Some(1.0));
    assert!(log.len() > 2);
}

#[tokio::test]
async fn test_rejected_transfer_keeps_status_and_message() {
    let (addr, _) = spawn_server().await;
    let transport = HttpTransport::new().unwrap();
    let (_, on_progress) = progress_log();

    let err = transport
        .transfer(
            &format!("http://{}/denied", addr),
            Bytes::from_static(b"abc"),
            "image/png",
            on_progress,
            CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.status, Some(403));
    assert_eq!(err.message, "signature mismatch");
}

#[tokio::test]
async fn test_cancel_aborts_in_flight_transfer() {
    let (addr, _) = spawn_server().await;
    let transport = HttpTransport::new().unwrap();
    let (_, on_progress) = progress_log();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        trigger.cancel();
    });

    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        transport.transfer(
            &format!("http://{}/slow", addr),
            Bytes::from_static(b"abc"),
            "image/png",
            on_progress,
            cancel,
        ),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(outcome, TransferOutcome::Cancelled);
}

#[tokio::test]
async fn test_unreachable_host_has_no_status() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let transport = HttpTransport::new().unwrap();
    let (_, on_progress) = progress_log();
    let err = transport
        .transfer(
            &format!("http://{}/upload/x.png", addr),
            Bytes::from_static(b"abc"),
            "image/png",
            on_progress,
            CancellationToken::new(),
        )
        .await
        .unwrap_err();
    assert_eq!(err.status, None);
}

#[tokio::test]
async fn test_processing_trigger_statuses() {
    let (addr, _) = spawn_server().await;
    let trigger = HttpProcessingTrigger::new(format!("http://{}/process-image", addr)).unwrap();

    let ack = trigger.trigger("projects/p/a.png").await.unwrap();
    assert_eq!(ack.status, 200);
    assert!(!ack.is_partial());

    let ack = trigger.trigger("projects/p/partial.png").await.unwrap();
    assert_eq!(ack.status, 207);
    assert_eq!(ack.failed_widths, vec![800]);

    let err = trigger.trigger("projects/p/missing.png").await.unwrap_err();
    assert!(matches!(err, TriggerError::Rejected { status: 500, .. }));
}

#[tokio::test]
async fn test_http_grants() {
    let (addr, _) = spawn_server().await;
    let grants = HttpGrants::new(&format!("http://{}/", addr)).unwrap();

    let grant = grants.grant("projects/p/a.png").await.unwrap();
    assert_eq!(grant.bucket, "raw");
    assert_eq!(grant.path, "projects/p/a.png");
    assert!(grant.url.starts_with("https://storage.test/raw/projects/p/a.png"));

    assert!(grants.grant("projects/../a.png").await.is_err());
}

#[tokio::test]
async fn test_rest_record_store() {
    let (addr, _) = spawn_server().await;
    let store = RestRecordStore::new(format!("http://{}/rest", addr), "secret").unwrap();

    let row = store
        .insert("variations", json!({"letter": "A"}))
        .await
        .unwrap();
    let id: Uuid = serde_json::from_value(row["id"].clone()).unwrap();
    assert_eq!(row["letter"], "A");

    let row = store
        .update("variations", id, json!({"storage_path": "projects/p/a.png"}))
        .await
        .unwrap();
    assert_eq!(row["storage_path"], "projects/p/a.png");

    let err = store
        .update("variations", Uuid::nil(), json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, RecordStoreError::NotFound { .. }));

    store.delete("variations", id).await.unwrap();

    let wrong_key = RestRecordStore::new(format!("http://{}/rest", addr), "nope").unwrap();
    let err = wrong_key
        .insert("variations", json!({"letter": "B"}))
        .await
        .unwrap_err();
    assert!(matches!(err, RecordStoreError::Rejected { status: 401, .. }));
}
