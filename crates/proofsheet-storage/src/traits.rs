//! Storage abstraction trait
//!
//! This module defines the Storage trait the pipeline talks to. Callers never see an
//! `object_store` type; they name a bucket and an object path.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Object already exists: {0}")]
    AlreadyExists(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Unknown bucket: {0}")]
    UnknownBucket(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("{} of {} deletions failed", failed.len(), attempted)]
    PartialDelete {
        attempted: usize,
        /// `(path, error)` for each object that could not be removed.
        failed: Vec<(String, String)>,
    },
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// One listed object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectEntry {
    pub path: String,
    pub size: u64,
}

/// Bucket-aware storage abstraction
///
/// All backends (S3, local filesystem, memory) implement this trait.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Download an object fully into memory.
    async fn download(&self, bucket: &str, path: &str) -> StorageResult<Bytes>;

    /// Write an object.
    ///
    /// With `upsert = false` an existing object is left untouched and
    /// [`StorageError::AlreadyExists`] is returned; with `upsert = true` it is overwritten.
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: Bytes,
        content_type: &str,
        upsert: bool,
    ) -> StorageResult<()>;

    /// Create a time-boxed URL that accepts a single HTTP `PUT` of the object bytes.
    ///
    /// Only supported by S3 backends; other backends return a `ConfigError`.
    async fn create_upload_grant(
        &self,
        bucket: &str,
        path: &str,
        expires_in: Duration,
    ) -> StorageResult<String>;

    /// List at most `limit` objects under `prefix` (whole path segments).
    async fn list(&self, bucket: &str, prefix: &str, limit: usize)
        -> StorageResult<Vec<ObjectEntry>>;

    /// Delete objects. Missing objects are not an error.
    ///
    /// Every path is attempted; if some fail the call returns
    /// [`StorageError::PartialDelete`] naming them.
    async fn delete(&self, bucket: &str, paths: &[String]) -> StorageResult<()>;

    /// Check if an object exists
    async fn exists(&self, bucket: &str, path: &str) -> StorageResult<bool>;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;
}
