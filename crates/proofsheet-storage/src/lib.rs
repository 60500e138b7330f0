//! Proofsheet Storage Library
//!
//! Bucket-aware object storage for the media pipeline. A single [`ObjectStorage`]
//! implementation sits on top of `object_store` and is backed by S3, the local
//! filesystem or memory.
//!
//! # Buckets
//!
//! Storage holds a fixed set of named buckets (the raw uploads area and the processed
//! derivatives area). Every operation names its bucket; unknown buckets are rejected.
//! Object paths must be relative keys: no leading `/` and no `..` segment.

pub mod factory;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod memory;
pub mod object;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;

// Re-export commonly used types
pub use factory::create_storage;
pub use object::ObjectStorage;
pub use proofsheet_core::StorageBackend;
pub use traits::{ObjectEntry, Storage, StorageError, StorageResult};
