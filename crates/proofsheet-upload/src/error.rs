use crate::records::RecordStoreError;
use proofsheet_core::AppError;
use thiserror::Error;

/// Batch-level failures. Item-level failures end up in the item's state instead.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Record store error: {0}")]
    RecordStore(#[from] RecordStoreError),

    #[error("Batch task failed: {0}")]
    Internal(String),
}

impl From<UploadError> for AppError {
    fn from(err: UploadError) -> Self {
        match err {
            UploadError::Validation(msg) => AppError::Validation(msg),
            UploadError::RecordStore(e) => AppError::RecordStore(e.to_string()),
            UploadError::Internal(msg) => AppError::Internal(msg),
        }
    }
}
