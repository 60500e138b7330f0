//! Storage cleanup after a parent entity is deleted

mod service;

pub use service::CleanupService;

use proofsheet_core::AppError;
use proofsheet_storage::StorageError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CleanupError {
    #[error("failed to list {bucket}/{prefix}: {source}")]
    List {
        bucket: String,
        prefix: String,
        #[source]
        source: StorageError,
    },

    #[error("{failed} of {attempted} objects could not be deleted from {bucket}")]
    Delete {
        bucket: String,
        attempted: usize,
        failed: usize,
    },
}

impl From<CleanupError> for AppError {
    fn from(err: CleanupError) -> Self {
        AppError::Cleanup(err.to_string())
    }
}

/// What one bucket gave back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BucketCleanup {
    pub bucket: String,
    pub deleted: usize,
    pub failed: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub prefix: String,
    pub buckets: Vec<BucketCleanup>,
}

impl CleanupReport {
    pub fn deleted(&self) -> usize {
        self.buckets.iter().map(|b| b.deleted).sum()
    }

    pub fn failed(&self) -> usize {
        self.buckets.iter().map(|b| b.failed).sum()
    }

    /// True when no bucket reported an error.
    pub fn is_complete(&self) -> bool {
        self.buckets.iter().all(|b| b.errors.is_empty())
    }
}
