use async_trait::async_trait;
use proofsheet_core::models::{SourceFile, UploadItem, UploadStatus};
use proofsheet_core::{FormatPolicy, ProcessingTrigger, TriggerAck, TriggerError};
use proofsheet_storage::{ObjectStorage, Storage};
use proofsheet_upload::memory::{DirectGrants, InMemoryRecordStore, SimulatedTransport};
use proofsheet_upload::records::{VARIATIONS_TABLE, VERSIONS_TABLE};
use proofsheet_upload::{
    BatchContext, OrchestratorSettings, Records, UploadError, UploadOrchestrator, VersionTarget,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

const RAW: &str = "raw";

#[derive(Default)]
struct RecordingTrigger {
    calls: Mutex<Vec<String>>,
    failure: Mutex<Option<TriggerError>>,
    partial: Mutex<bool>,
}

impl RecordingTrigger {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessingTrigger for RecordingTrigger {
    async fn trigger(&self, original_path: &str) -> Result<TriggerAck, TriggerError> {
        self.calls.lock().unwrap().push(original_path.to_string());
        if let Some(err) = self.failure.lock().unwrap().take() {
            return Err(err);
        }
        if *self.partial.lock().unwrap() {
            return Ok(TriggerAck {
                status: 207,
                failed_widths: vec![800],
            });
        }
        Ok(TriggerAck::complete())
    }
}

struct Harness {
    storage: Arc<ObjectStorage>,
    records: Arc<InMemoryRecordStore>,
    transport: Arc<SimulatedTransport>,
    trigger: Arc<RecordingTrigger>,
    orchestrator: UploadOrchestrator,
}

fn harness(concurrency: usize, steps: u32, step_delay_ms: u64) -> Harness {
    let storage = Arc::new(ObjectStorage::in_memory([RAW]));
    let records = Arc::new(InMemoryRecordStore::new());
    let transport = Arc::new(
        SimulatedTransport::new(storage.clone())
            .with_timing(steps, Duration::from_millis(step_delay_ms)),
    );
    let trigger = Arc::new(RecordingTrigger::default());
    let orchestrator = UploadOrchestrator::new(
        Records::new(records.clone()),
        Arc::new(DirectGrants::new(RAW)),
        transport.clone(),
        trigger.clone(),
        OrchestratorSettings {
            policy: FormatPolicy::new(["jpg", "jpeg", "png", "webp", "gif"], ["gif"]),
            max_file_size_bytes: 1024,
            concurrency,
        },
    );
    Harness {
        storage,
        records,
        transport,
        trigger,
        orchestrator,
    }
}

fn context() -> BatchContext {
    BatchContext {
        project_id: Uuid::new_v4(),
        design_id: Uuid::new_v4(),
        version: VersionTarget::Existing(Uuid::new_v4()),
        first_letter_index: 0,
    }
}

fn file(name: &str) -> SourceFile {
    SourceFile::new(name, "image/png", vec![7u8; 100])
}

fn count(items: &[UploadItem], status: UploadStatus) -> usize {
    items.iter().filter(|i| i.status == status).count()
}

#[tokio::test]
async fn test_five_files_keep_three_in_flight() {
    let h = harness(3, 10, 20);
    let files = (0..5).map(|i| file(&format!("f{}.png", i))).collect();

    let handle = h.orchestrator.submit_batch(files, context()).await.unwrap();
    let mut rx = handle.subscribe();
    tokio::time::timeout(
        Duration::from_secs(5),
        rx.wait_for(|items| {
            count(items, UploadStatus::Uploading) == 3 && count(items, UploadStatus::Pending) == 2
        }),
    )
    .await
    .expect("three uploads should be in flight")
    .unwrap();
    drop(rx);

    let report = tokio::time::timeout(Duration::from_secs(10), handle.wait())
        .await
        .unwrap()
        .unwrap();

    assert!(report.all_succeeded());
    assert_eq!(report.items.len(), 5);
    assert_eq!(h.transport.max_in_flight(), 3);
    assert_eq!(h.trigger.calls().len(), 5);

    let raw = h.storage.list(RAW, "projects", 100).await.unwrap();
    assert_eq!(raw.len(), 5);
    for row in h.records.rows(VARIATIONS_TABLE) {
        assert_eq!(row["status"], "uploaded");
        assert!(row["storage_path"].is_string());
    }
}

#[tokio::test]
async fn test_successful_items_leave_visible_queue() {
    let h = harness(2, 2, 1);
    let handle = h
        .orchestrator
        .submit_batch(vec![file("a.png"), file("b.png")], context())
        .await
        .unwrap();
    let mut rx = handle.subscribe();
    rx.wait_for(|items| items.is_empty()).await.unwrap();
    drop(rx);

    let report = handle.wait().await.unwrap();
    let names: Vec<&str> = report.items.iter().map(|i| i.file_name.as_str()).collect();
    assert_eq!(names, vec!["a.png", "b.png"]);
    assert!(report.items.iter().all(|i| i.storage_path.is_some()));
}

#[tokio::test]
async fn test_transport_failure_is_isolated() {
    let h = harness(3, 2, 1);
    h.transport.fail_urls_ending_with(".jpeg");

    let handle = h
        .orchestrator
        .submit_batch(
            vec![file("a.png"), file("b.jpeg"), file("c.png")],
            context(),
        )
        .await
        .unwrap();
    let report = handle.wait().await.unwrap();

    let statuses: Vec<UploadStatus> = report.items.iter().map(|i| i.status).collect();
    assert_eq!(
        statuses,
        vec![UploadStatus::Success, UploadStatus::Error, UploadStatus::Success]
    );
    assert!(report.items[1].error.as_deref().unwrap().contains("403"));

    let failed_id = report.items[1].record_id.unwrap();
    let row = h.records.get(VARIATIONS_TABLE, failed_id).unwrap();
    assert!(row["storage_path"].is_null());
    assert_eq!(h.trigger.calls().len(), 2);
}

#[tokio::test]
async fn test_record_failure_skips_transport() {
    let h = harness(3, 2, 1);
    h.records
        .fail_inserts_where(VARIATIONS_TABLE, "file_name", "b.png");

    let handle = h
        .orchestrator
        .submit_batch(
            vec![file("a.png"), file("b.png"), file("c.png")],
            context(),
        )
        .await
        .unwrap();
    let report = handle.wait().await.unwrap();

    assert_eq!(report.items[1].status, UploadStatus::Error);
    assert!(report.items[1].record_id.is_none());
    assert_eq!(report.succeeded(), 2);
    assert_eq!(h.transport.transfers(), 2);
}

#[tokio::test]
async fn test_cancel_in_flight_item() {
    let h = harness(2, 20, 25);
    let handle = h
        .orchestrator
        .submit_batch(vec![file("a.png"), file("b.png")], context())
        .await
        .unwrap();
    let first = handle.snapshot()[0].id;

    let mut rx = handle.subscribe();
    rx.wait_for(|items| {
        items
            .iter()
            .any(|i| i.id == first && i.status == UploadStatus::Uploading)
    })
    .await
    .unwrap();
    drop(rx);

    assert!(handle.cancel(first));
    assert!(!handle.cancel(Uuid::new_v4()));

    let report = handle.wait().await.unwrap();
    assert_eq!(report.items[0].status, UploadStatus::Cancelled);
    assert!(report.items[0].error.is_none());
    assert_eq!(report.items[1].status, UploadStatus::Success);

    let record_id = report.items[0].record_id.unwrap();
    let row = h.records.get(VARIATIONS_TABLE, record_id).unwrap();
    assert!(row["storage_path"].is_null());
    assert_eq!(h.storage.list(RAW, "projects", 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_cancel_before_start() {
    let h = harness(1, 10, 20);
    let handle = h
        .orchestrator
        .submit_batch(vec![file("a.png"), file("b.png")], context())
        .await
        .unwrap();
    let second = handle.snapshot()[1].id;
    assert!(handle.cancel(second));
    assert_eq!(handle.snapshot()[1].status, UploadStatus::Cancelled);
    assert!(!handle.cancel(second));

    let report = handle.wait().await.unwrap();
    assert_eq!(report.items[0].status, UploadStatus::Success);
    assert_eq!(report.items[1].status, UploadStatus::Cancelled);
    assert!(report.items[1].record_id.is_none());
    assert_eq!(h.records.rows(VARIATIONS_TABLE).len(), 1);
    assert_eq!(h.transport.transfers(), 1);
}

#[tokio::test]
async fn test_cancel_queued_item_shows_immediately() {
    let h = harness(1, 20, 50);
    let handle = h
        .orchestrator
        .submit_batch(vec![file("a.png"), file("b.png")], context())
        .await
        .unwrap();
    let first = handle.snapshot()[0].id;
    let second = handle.snapshot()[1].id;

    let mut rx = handle.subscribe();
    rx.wait_for(|items| {
        items
            .iter()
            .any(|i| i.id == first && i.status == UploadStatus::Uploading)
    })
    .await
    .unwrap();
    drop(rx);

    assert!(handle.cancel(second));
    let queued = handle
        .snapshot()
        .into_iter()
        .find(|i| i.id == second)
        .unwrap();
    assert_eq!(queued.status, UploadStatus::Cancelled);

    let report = handle.wait().await.unwrap();
    assert_eq!(report.items[0].status, UploadStatus::Success);
    assert_eq!(report.items[1].status, UploadStatus::Cancelled);
    assert_eq!(h.transport.transfers(), 1);

    let record_id = report.items[1].record_id.unwrap();
    let row = h.records.get(VARIATIONS_TABLE, record_id).unwrap();
    assert!(row["storage_path"].is_null());
}

#[tokio::test]
async fn test_preview_handle_reaches_snapshot() {
    let h = harness(1, 2, 1);
    let handle = h
        .orchestrator
        .submit_batch(
            vec![file("a.png").with_preview("blob:preview-a"), file("b.png")],
            context(),
        )
        .await
        .unwrap();

    let snapshot = handle.snapshot();
    assert_eq!(snapshot[0].preview_handle.as_deref(), Some("blob:preview-a"));
    assert!(snapshot[1].preview_handle.is_none());
    handle.wait().await.unwrap();
}

#[tokio::test]
async fn test_rejected_files_never_get_records() {
    let h = harness(2, 2, 1);
    let big = SourceFile::new("big.png", "image/png", vec![0u8; 4096]);

    let handle = h
        .orchestrator
        .submit_batch(
            vec![file("vector.svg"), big, file("ok.png")],
            context(),
        )
        .await
        .unwrap();

    let snapshot = handle.snapshot();
    assert_eq!(snapshot[0].status, UploadStatus::Error);
    assert_eq!(snapshot[1].status, UploadStatus::Error);
    assert!(snapshot[1].error_message.as_deref().unwrap().contains("limit"));
    assert_eq!(snapshot[2].letter.as_deref(), Some("A"));

    let rejected = snapshot[0].id;
    assert!(handle.dismiss(rejected));
    assert!(handle.snapshot().iter().all(|i| i.id != rejected));

    let report = handle.wait().await.unwrap();
    assert_eq!(report.items.len(), 3);
    assert_eq!(report.succeeded(), 1);
    assert_eq!(h.records.rows(VARIATIONS_TABLE).len(), 1);
}

#[tokio::test]
async fn test_letters_continue_from_offset() {
    let h = harness(2, 1, 1);
    let handle = h
        .orchestrator
        .submit_batch(
            vec![file("a.png"), file("b.png")],
            BatchContext {
                first_letter_index: 25,
                ..context()
            },
        )
        .await
        .unwrap();
    let report = handle.wait().await.unwrap();
    let letters: Vec<&str> = report
        .items
        .iter()
        .map(|i| i.letter.as_deref().unwrap())
        .collect();
    assert_eq!(letters, vec!["Z", "AA"]);
}

#[tokio::test]
async fn test_new_version_is_created_first() {
    let h = harness(2, 1, 1);
    let handle = h
        .orchestrator
        .submit_batch(
            vec![file("a.png")],
            BatchContext {
                version: VersionTarget::NewVersion,
                ..context()
            },
        )
        .await
        .unwrap();
    let version_id = handle.version_id();
    let report = handle.wait().await.unwrap();

    assert_eq!(report.version_id, version_id);
    assert_eq!(h.records.rows(VERSIONS_TABLE).len(), 1);
    let variation = &h.records.rows(VARIATIONS_TABLE)[0];
    assert_eq!(variation["version_id"], version_id.to_string());
    assert!(variation["storage_path"]
        .as_str()
        .unwrap()
        .contains(&format!("/versions/{}/", version_id)));
}

#[tokio::test]
async fn test_version_failure_aborts_batch() {
    let h = harness(2, 1, 1);
    h.records.fail_inserts(VERSIONS_TABLE);

    let result = h
        .orchestrator
        .submit_batch(
            vec![file("a.png")],
            BatchContext {
                version: VersionTarget::NewVersion,
                ..context()
            },
        )
        .await;

    assert!(matches!(result, Err(UploadError::RecordStore(_))));
    assert!(h.records.rows(VARIATIONS_TABLE).is_empty());
    assert_eq!(h.transport.transfers(), 0);
}

#[tokio::test]
async fn test_empty_batch_is_rejected() {
    let h = harness(2, 1, 1);
    let result = h.orchestrator.submit_batch(Vec::new(), context()).await;
    assert!(matches!(result, Err(UploadError::Validation(_))));
}

#[tokio::test]
async fn test_trigger_problems_are_warnings() {
    let h = harness(1, 1, 1);
    *h.trigger.failure.lock().unwrap() = Some(TriggerError::Unreachable("down".to_string()));
    *h.trigger.partial.lock().unwrap() = true;

    let handle = h
        .orchestrator
        .submit_batch(vec![file("a.png"), file("b.png")], context())
        .await
        .unwrap();
    let report = handle.wait().await.unwrap();

    assert!(report.all_succeeded());
    assert_eq!(report.warnings.len(), 2);
    assert!(report.warnings.iter().any(|w| w.contains("down")));
    assert!(report.warnings.iter().any(|w| w.contains("800")));
}

#[tokio::test]
async fn test_record_patch_failure_fails_item_without_trigger() {
    let h = harness(2, 1, 1);
    h.records.fail_updates(VARIATIONS_TABLE);

    let handle = h
        .orchestrator
        .submit_batch(vec![file("a.png")], context())
        .await
        .unwrap();
    let report = handle.wait().await.unwrap();

    assert_eq!(report.items[0].status, UploadStatus::Error);
    assert!(h.trigger.calls().is_empty());
}
