use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariationStatus {
    Pending,
    Uploaded,
}

/// A `variations` row. Created before any bytes move; `storage_path` stays empty until the
/// transfer completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariationRecord {
    pub id: Uuid,
    #[serde(rename = "version_id")]
    pub parent_version_id: Uuid,
    pub letter: String,
    pub status: VariationStatus,
    #[serde(default)]
    pub storage_path: Option<String>,
}

/// Row inserted for a freshly accepted upload item.
#[derive(Debug, Clone, Serialize)]
pub struct NewVariation {
    pub version_id: Uuid,
    pub letter: String,
    pub status: VariationStatus,
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
}

/// Patch applied once the original is stored.
#[derive(Debug, Clone, Serialize)]
pub struct VariationUploaded {
    pub storage_path: String,
    pub status: VariationStatus,
}

impl VariationUploaded {
    pub fn new(storage_path: impl Into<String>) -> Self {
        Self {
            storage_path: storage_path.into(),
            status: VariationStatus::Uploaded,
        }
    }
}

/// A `versions` row, the parent of a batch's variations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionRecord {
    pub id: Uuid,
    pub design_id: Uuid,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewVersion {
    pub design_id: Uuid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variation_record_from_row() {
        let id = Uuid::new_v4();
        let version = Uuid::new_v4();
        let row = serde_json::json!({
            "id": id,
            "version_id": version,
            "letter": "B",
            "status": "pending",
            "storage_path": null,
            "created_at": "2026-01-01T00:00:00Z"
        });
        let record: VariationRecord = serde_json::from_value(row).unwrap();
        assert_eq!(record.id, id);
        assert_eq!(record.parent_version_id, version);
        assert_eq!(record.status, VariationStatus::Pending);
        assert!(record.storage_path.is_none());
    }

    #[test]
    fn test_uploaded_patch_shape() {
        let patch = serde_json::to_value(VariationUploaded::new("projects/p/x.png")).unwrap();
        assert_eq!(patch["status"], "uploaded");
        assert_eq!(patch["storage_path"], "projects/p/x.png");
    }
}
