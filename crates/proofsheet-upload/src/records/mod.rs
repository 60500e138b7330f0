//! Record store access
//!
//! The record store is an external table service reached through a generic
//! insert/update/delete interface over JSON rows. [`Records`] layers the typed
//! version and variation operations the orchestrator needs on top of it.

mod rest;

pub use rest::RestRecordStore;

use async_trait::async_trait;
use proofsheet_core::models::{
    NewVariation, NewVersion, VariationRecord, VariationUploaded, VersionRecord,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

pub use proofsheet_core::constants::{VARIATIONS_TABLE, VERSIONS_TABLE};

#[derive(Debug, Clone, Error)]
pub enum RecordStoreError {
    #[error("record store request failed: {0}")]
    Request(String),

    #[error("record store rejected the write ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("no {table} row with id {id}")]
    NotFound { table: String, id: Uuid },

    #[error("unexpected record store response: {0}")]
    Decode(String),
}

/// Generic row-level access to the record store.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Insert a row and return it as stored (with its generated `id`).
    async fn insert(&self, table: &str, row: Value) -> Result<Value, RecordStoreError>;

    /// Apply `patch` to the row with `id` and return the updated row.
    async fn update(&self, table: &str, id: Uuid, patch: Value) -> Result<Value, RecordStoreError>;

    async fn delete(&self, table: &str, id: Uuid) -> Result<(), RecordStoreError>;
}

/// Typed operations on versions and variations.
#[derive(Clone)]
pub struct Records {
    store: Arc<dyn RecordStore>,
}

impl Records {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    pub async fn create_version(&self, design_id: Uuid) -> Result<VersionRecord, RecordStoreError> {
        self.insert(VERSIONS_TABLE, &NewVersion { design_id }).await
    }

    pub async fn create_variation(
        &self,
        variation: &NewVariation,
    ) -> Result<VariationRecord, RecordStoreError> {
        self.insert(VARIATIONS_TABLE, variation).await
    }

    /// Record the raw storage path once the original is stored.
    pub async fn mark_uploaded(
        &self,
        variation_id: Uuid,
        storage_path: &str,
    ) -> Result<VariationRecord, RecordStoreError> {
        let patch = encode(&VariationUploaded::new(storage_path))?;
        let row = self
            .store
            .update(VARIATIONS_TABLE, variation_id, patch)
            .await?;
        decode(row)
    }

    async fn insert<T: Serialize, R: DeserializeOwned>(
        &self,
        table: &str,
        row: &T,
    ) -> Result<R, RecordStoreError> {
        let row = self.store.insert(table, encode(row)?).await?;
        decode(row)
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Value, RecordStoreError> {
    serde_json::to_value(value).map_err(|e| RecordStoreError::Decode(e.to_string()))
}

fn decode<R: DeserializeOwned>(row: Value) -> Result<R, RecordStoreError> {
    serde_json::from_value(row).map_err(|e| RecordStoreError::Decode(e.to_string()))
}
