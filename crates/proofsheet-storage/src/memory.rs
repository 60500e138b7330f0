//! In-memory backend, used by tests and the CLI dry run.

use crate::object::ObjectStorage;
use crate::StorageBackend;
use object_store::memory::InMemory;
use std::sync::Arc;

impl ObjectStorage {
    /// One empty in-memory store per bucket.
    pub fn in_memory<I, S>(buckets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        buckets
            .into_iter()
            .fold(ObjectStorage::new(StorageBackend::Memory), |storage, bucket| {
                storage.with_bucket(bucket, Arc::new(InMemory::new()), None)
            })
    }
}
