//! Local filesystem backend. Each bucket is a subdirectory of the storage root.

use crate::object::ObjectStorage;
use crate::traits::{StorageError, StorageResult};
use crate::StorageBackend;
use object_store::local::LocalFileSystem;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;

impl ObjectStorage {
    /// Create local storage rooted at `base_path`
    ///
    /// # Arguments
    /// * `base_path` - Root directory (e.g., "/var/lib/proofsheet/storage")
    /// * `buckets` - Bucket names; each becomes `{base_path}/{bucket}`
    pub async fn local<I, S>(base_path: impl Into<PathBuf>, buckets: I) -> StorageResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let base_path = base_path.into();
        let mut storage = ObjectStorage::new(StorageBackend::Local);

        for bucket in buckets {
            let bucket = bucket.into();
            if bucket.is_empty() || bucket.contains('/') || bucket == "." || bucket == ".." {
                return Err(StorageError::ConfigError(format!(
                    "Invalid bucket name for local storage: {:?}",
                    bucket
                )));
            }

            let dir = base_path.join(&bucket);
            fs::create_dir_all(&dir).await.map_err(|e| {
                StorageError::ConfigError(format!(
                    "Failed to create storage directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;

            let store = LocalFileSystem::new_with_prefix(&dir)
                .map_err(|e| StorageError::ConfigError(e.to_string()))?
                .with_automatic_cleanup(true);

            storage = storage.with_bucket(bucket, Arc::new(store), None);
        }

        Ok(storage)
    }
}
