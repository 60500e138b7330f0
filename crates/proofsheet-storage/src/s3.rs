//! S3 backend, including S3-compatible providers reached through a custom endpoint.

use crate::object::ObjectStorage;
use crate::traits::{StorageError, StorageResult};
use crate::StorageBackend;
use object_store::aws::AmazonS3Builder;
use object_store::signer::Signer;
use std::sync::Arc;

impl ObjectStorage {
    /// Create S3 storage with one store per bucket
    ///
    /// # Arguments
    /// * `buckets` - S3 bucket names
    /// * `region` - AWS region (or region identifier for S3-compatible providers)
    /// * `endpoint_url` - Optional custom endpoint for S3-compatible providers
    ///   (e.g., "http://localhost:9000" for MinIO)
    ///
    /// Credentials come from the standard `AWS_*` environment variables.
    pub fn s3<I, S>(buckets: I, region: &str, endpoint_url: Option<&str>) -> StorageResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut storage = ObjectStorage::new(StorageBackend::S3);

        for bucket in buckets {
            let bucket = bucket.into();
            let mut builder = AmazonS3Builder::from_env()
                .with_region(region)
                .with_bucket_name(bucket.clone());

            if let Some(endpoint) = endpoint_url {
                let allow_http = endpoint.starts_with("http://");
                builder = builder.with_endpoint(endpoint).with_allow_http(allow_http);
            }

            let store = Arc::new(
                builder
                    .build()
                    .map_err(|e| StorageError::ConfigError(e.to_string()))?,
            );

            let signer: Arc<dyn Signer> = store.clone();
            storage = storage.with_bucket(bucket, store, Some(signer));
        }

        Ok(storage)
    }
}
