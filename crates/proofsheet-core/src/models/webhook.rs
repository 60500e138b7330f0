//! JSON bodies for the processing endpoint, the storage webhooks and upload grants.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::derivative::{BatchOutcome, BatchStatus, ProcessingOutcome};

/// `POST /process-image` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessImageRequest {
    #[serde(rename = "originalPath")]
    pub original_path: String,
}

/// `POST /process-image` response for 200 and 207.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessImageResponse {
    #[serde(rename = "originalPath")]
    pub original_path: String,
    pub status: BatchStatus,
    pub derivatives: Vec<ProcessingOutcome>,
    /// Widths that failed; empty unless `status` is `partial`.
    #[serde(rename = "failedWidths", default)]
    pub failed_widths: Vec<u32>,
}

impl From<BatchOutcome> for ProcessImageResponse {
    fn from(outcome: BatchOutcome) -> Self {
        let failed_widths = outcome.failed_widths();
        Self {
            original_path: outcome.original_path,
            status: outcome.status,
            derivatives: outcome.outcomes,
            failed_widths,
        }
    }
}

/// Object row reported by the storage provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageObjectRecord {
    pub name: String,
    pub bucket_id: String,
}

/// Storage "object inserted" event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageInsertEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub table: String,
    #[serde(default)]
    pub record: Option<StorageObjectRecord>,
}

/// Row removed by a cascading delete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletedRecord {
    pub id: String,
    #[serde(default)]
    pub project_id: Option<String>,
}

/// Database "row deleted" event for `projects` or `designs`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeletionEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub table: String,
    #[serde(default)]
    pub old_record: Option<DeletedRecord>,
}

/// `POST /upload-grants` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadGrantRequest {
    pub path: String,
}

/// A time-boxed signed PUT URL for one raw object path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadGrantResponse {
    pub url: String,
    pub bucket: String,
    pub path: String,
    pub expires_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_event_deserializes_provider_shape() {
        let event: StorageInsertEvent = serde_json::from_value(serde_json::json!({
            "type": "INSERT",
            "table": "objects",
            "schema": "storage",
            "record": {"name": "projects/p/a.png", "bucket_id": "design-uploads", "owner": null}
        }))
        .unwrap();
        assert_eq!(event.event_type, "INSERT");
        assert_eq!(event.record.unwrap().bucket_id, "design-uploads");
    }

    #[test]
    fn test_deletion_event_project_id_optional() {
        let event: DeletionEvent = serde_json::from_value(serde_json::json!({
            "type": "DELETE",
            "table": "projects",
            "old_record": {"id": "P"}
        }))
        .unwrap();
        let old = event.old_record.unwrap();
        assert_eq!(old.id, "P");
        assert!(old.project_id.is_none());
    }

    #[test]
    fn test_process_image_request_uses_camel_case() {
        let req: ProcessImageRequest =
            serde_json::from_str(r#"{"originalPath":"projects/p/a.png"}"#).unwrap();
        assert_eq!(req.original_path, "projects/p/a.png");
    }
}
