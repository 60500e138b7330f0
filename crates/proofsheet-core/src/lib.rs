//! Proofsheet Core Library
//!
//! This crate provides the domain models, error types, configuration, format allow-list
//! and path conventions shared by every Proofsheet component: the upload client, the
//! derivative generator, the cleanup service and the HTTP API.

pub mod config;
pub mod constants;
pub mod error;
pub mod formats;
pub mod hooks;
pub mod models;
pub mod paths;
pub mod storage_types;

// Re-export commonly used types
pub use config::{Config, ServiceConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use formats::{FormatPolicy, ImageKind};
pub use hooks::{NoOpProcessingTrigger, ProcessingTrigger, TriggerAck, TriggerError};
pub use paths::{
    derive_path, raw_object_path, variation_letter, OwnedPrefix, ParentKind, PathDeriver,
};
pub use storage_types::StorageBackend;
