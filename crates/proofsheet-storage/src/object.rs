use crate::traits::{ObjectEntry, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt, TryStreamExt};
use http::Method;
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::Error as ObjectStoreError;
use object_store::{
    Attribute, Attributes, ObjectStore, ObjectStoreExt, PutMode, PutOptions, PutPayload,
    Result as ObjectResult,
};
use proofsheet_core::paths::validate_object_path;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Deletions issued concurrently per `delete` call.
const DELETE_CONCURRENCY: usize = 16;

#[derive(Clone)]
struct BucketHandle {
    store: Arc<dyn ObjectStore>,
    signer: Option<Arc<dyn Signer>>,
}

/// Named buckets over `object_store` backends.
#[derive(Clone)]
pub struct ObjectStorage {
    backend: StorageBackend,
    buckets: HashMap<String, BucketHandle>,
    /// The local filesystem store rejects object attributes.
    content_type_attributes: bool,
}

impl ObjectStorage {
    pub(crate) fn new(backend: StorageBackend) -> Self {
        Self {
            backend,
            buckets: HashMap::new(),
            content_type_attributes: backend != StorageBackend::Local,
        }
    }

    pub(crate) fn with_bucket(
        mut self,
        name: impl Into<String>,
        store: Arc<dyn ObjectStore>,
        signer: Option<Arc<dyn Signer>>,
    ) -> Self {
        self.buckets.insert(name.into(), BucketHandle { store, signer });
        self
    }

    /// Names of the configured buckets.
    pub fn bucket_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.buckets.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    fn bucket(&self, name: &str) -> StorageResult<&BucketHandle> {
        self.buckets
            .get(name)
            .ok_or_else(|| StorageError::UnknownBucket(name.to_string()))
    }

    fn location(path: &str) -> StorageResult<Path> {
        validate_object_path(path).map_err(|e| StorageError::InvalidKey(e.to_string()))?;
        Path::parse(path).map_err(|e| StorageError::InvalidKey(e.to_string()))
    }
}

#[async_trait]
impl Storage for ObjectStorage {
    async fn download(&self, bucket: &str, path: &str) -> StorageResult<Bytes> {
        let handle = self.bucket(bucket)?;
        let location = Self::location(path)?;
        let start = Instant::now();

        let result: ObjectResult<_> = handle.store.get(&location).await;

        let result = result.map_err(|e| match e {
            ObjectStoreError::NotFound { .. } => StorageError::NotFound(path.to_string()),
            other => {
                tracing::error!(
                    error = %other,
                    bucket = %bucket,
                    key = %path,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Storage download failed"
                );
                StorageError::DownloadFailed(other.to_string())
            }
        })?;

        let bytes = result
            .bytes()
            .await
            .map_err(|e| StorageError::DownloadFailed(e.to_string()))?;

        tracing::info!(
            bucket = %bucket,
            key = %path,
            size_bytes = bytes.len() as u64,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Storage download successful"
        );

        Ok(bytes)
    }

    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        data: Bytes,
        content_type: &str,
        upsert: bool,
    ) -> StorageResult<()> {
        let handle = self.bucket(bucket)?;
        let location = Self::location(path)?;
        let size = data.len() as u64;
        let start = Instant::now();

        let mut opts = PutOptions {
            mode: if upsert {
                PutMode::Overwrite
            } else {
                PutMode::Create
            },
            ..Default::default()
        };
        if self.content_type_attributes {
            let mut attributes = Attributes::new();
            attributes.insert(Attribute::ContentType, content_type.to_string().into());
            opts.attributes = attributes;
        }

        let result: ObjectResult<_> = handle
            .store
            .put_opts(&location, PutPayload::from(data), opts)
            .await;

        result.map_err(|e| match e {
            ObjectStoreError::AlreadyExists { .. } => {
                tracing::debug!(bucket = %bucket, key = %path, "Object exists, upsert disabled");
                StorageError::AlreadyExists(path.to_string())
            }
            other => {
                tracing::error!(
                    error = %other,
                    bucket = %bucket,
                    key = %path,
                    size_bytes = size,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Storage upload failed"
                );
                StorageError::UploadFailed(other.to_string())
            }
        })?;

        tracing::info!(
            bucket = %bucket,
            key = %path,
            content_type = %content_type,
            size_bytes = size,
            upsert,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Storage upload successful"
        );

        Ok(())
    }

    async fn create_upload_grant(
        &self,
        bucket: &str,
        path: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        let handle = self.bucket(bucket)?;
        let location = Self::location(path)?;

        let signer = handle.signer.as_ref().ok_or_else(|| {
            StorageError::ConfigError(format!(
                "upload grants are not supported by the {} backend",
                self.backend
            ))
        })?;

        let url_result: ObjectResult<_> = signer
            .signed_url(Method::PUT, &location, expires_in)
            .await;

        let url = url_result
            .map_err(|e| StorageError::BackendError(e.to_string()))?
            .to_string();

        tracing::debug!(
            bucket = %bucket,
            key = %path,
            expires_in_secs = expires_in.as_secs(),
            "Upload grant created"
        );

        Ok(url)
    }

    async fn list(
        &self,
        bucket: &str,
        prefix: &str,
        limit: usize,
    ) -> StorageResult<Vec<ObjectEntry>> {
        let handle = self.bucket(bucket)?;
        let prefix = prefix.trim_end_matches('/');
        let prefix_path = if prefix.is_empty() {
            None
        } else {
            Some(Path::parse(prefix).map_err(|e| StorageError::InvalidKey(e.to_string()))?)
        };
        let start = Instant::now();

        let entries: Vec<ObjectEntry> = handle
            .store
            .list(prefix_path.as_ref())
            .take(limit)
            .map_ok(|meta| ObjectEntry {
                path: meta.location.to_string(),
                size: meta.size as u64,
            })
            .try_collect()
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    bucket = %bucket,
                    prefix = %prefix,
                    "Storage list failed"
                );
                StorageError::BackendError(e.to_string())
            })?;

        tracing::debug!(
            bucket = %bucket,
            prefix = %prefix,
            count = entries.len(),
            limit,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Storage list successful"
        );

        Ok(entries)
    }

    async fn delete(&self, bucket: &str, paths: &[String]) -> StorageResult<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let handle = self.bucket(bucket)?;
        let start = Instant::now();

        let results: Vec<(String, Result<(), String>)> = stream::iter(paths.iter().cloned())
            .map(|path| {
                let store = handle.store.clone();
                async move {
                    let outcome = match Self::location(&path) {
                        Ok(location) => match store.delete(&location).await {
                            Ok(()) | Err(ObjectStoreError::NotFound { .. }) => Ok(()),
                            Err(e) => Err(e.to_string()),
                        },
                        Err(e) => Err(e.to_string()),
                    };
                    (path, outcome)
                }
            })
            .buffer_unordered(DELETE_CONCURRENCY)
            .collect()
            .await;

        let failed: Vec<(String, String)> = results
            .into_iter()
            .filter_map(|(path, outcome)| outcome.err().map(|e| (path, e)))
            .collect();

        for (path, error) in &failed {
            tracing::error!(
                error = %error,
                bucket = %bucket,
                key = %path,
                "Storage delete failed"
            );
        }

        tracing::info!(
            bucket = %bucket,
            attempted = paths.len(),
            failed = failed.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Storage delete finished"
        );

        if failed.is_empty() {
            Ok(())
        } else {
            Err(StorageError::PartialDelete {
                attempted: paths.len(),
                failed,
            })
        }
    }

    async fn exists(&self, bucket: &str, path: &str) -> StorageResult<bool> {
        let handle = self.bucket(bucket)?;
        let location = Self::location(path)?;
        match handle.store.head(&location).await {
            Ok(_) => Ok(true),
            Err(ObjectStoreError::NotFound { .. }) => Ok(false),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    fn backend_type(&self) -> StorageBackend {
        self.backend
    }
}
