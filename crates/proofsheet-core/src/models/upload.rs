use std::path::Path;

use bytes::Bytes;
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppError;
use crate::formats::content_type_for_path;

/// A file selected for upload, fully loaded in memory.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub mime_type: String,
    pub bytes: Bytes,
    /// Handle for rendering a preview (object URL, local path), copied onto the queue item.
    pub preview_handle: Option<String>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, mime_type: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            mime_type: mime_type.into(),
            bytes: bytes.into(),
            preview_handle: None,
        }
    }

    pub fn with_preview(mut self, handle: impl Into<String>) -> Self {
        self.preview_handle = Some(handle.into());
        self
    }

    /// Read a file from disk, guessing its MIME type from the extension. The preview handle
    /// is the file's path.
    pub async fn from_path(path: &Path) -> Result<Self, AppError> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| AppError::Validation(format!("invalid file name: {}", path.display())))?
            .to_string();
        let bytes = tokio::fs::read(path).await?;
        Ok(Self {
            mime_type: content_type_for_path(&name).to_string(),
            name,
            bytes: Bytes::from(bytes),
            preview_handle: Some(path.display().to_string()),
        })
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    Pending,
    Uploading,
    Success,
    Error,
    Cancelled,
}

impl UploadStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            UploadStatus::Success | UploadStatus::Error | UploadStatus::Cancelled
        )
    }
}

impl std::fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            UploadStatus::Pending => "pending",
            UploadStatus::Uploading => "uploading",
            UploadStatus::Success => "success",
            UploadStatus::Error => "error",
            UploadStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// One entry in a batch's visible upload queue.
///
/// The transfer's cancellation handle is held by the orchestrator, not the snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadItem {
    pub id: Uuid,
    pub file_name: String,
    pub mime_type: String,
    pub size_bytes: u64,
    /// Preview handle carried over from the source file.
    pub preview_handle: Option<String>,
    pub status: UploadStatus,
    pub progress_percent: u8,
    pub error_message: Option<String>,
    pub letter: Option<String>,
    pub record_id: Option<Uuid>,
    pub storage_path: Option<String>,
}

impl UploadItem {
    pub fn pending(file: &SourceFile) -> Self {
        Self {
            id: Uuid::new_v4(),
            file_name: file.name.clone(),
            mime_type: file.mime_type.clone(),
            size_bytes: file.size(),
            preview_handle: file.preview_handle.clone(),
            status: UploadStatus::Pending,
            progress_percent: 0,
            error_message: None,
            letter: None,
            record_id: None,
            storage_path: None,
        }
    }
}
