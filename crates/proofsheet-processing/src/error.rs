use proofsheet_core::AppError;
use proofsheet_storage::StorageError;
use thiserror::Error;

/// Fatal failures of a processing invocation.
///
/// Per-derivative encode and upload failures are not errors; they are reported as failed
/// outcomes inside a partial [`BatchOutcome`](proofsheet_core::models::BatchOutcome).
#[derive(Debug, Error)]
pub enum ProcessingError {
    #[error("invalid original path: {0}")]
    InvalidPath(String),

    #[error("failed to download {path}: {source}")]
    Download {
        path: String,
        #[source]
        source: StorageError,
    },

    #[error("failed to decode {path}: {message}")]
    Decode { path: String, message: String },

    #[error("failed to write {path}: {source}")]
    PassthroughUpload {
        path: String,
        #[source]
        source: StorageError,
    },

    #[error("processing task failed: {0}")]
    Task(String),
}

impl From<ProcessingError> for AppError {
    fn from(err: ProcessingError) -> Self {
        match err {
            ProcessingError::InvalidPath(msg) => AppError::Validation(msg),
            e @ ProcessingError::Download { .. } => AppError::Download(e.to_string()),
            e @ ProcessingError::Decode { .. } => AppError::ImageDecode(e.to_string()),
            e @ ProcessingError::PassthroughUpload { .. } => {
                AppError::DerivativeUpload(e.to_string())
            }
            ProcessingError::Task(msg) => AppError::Internal(msg),
        }
    }
}
