//! Storage setup and initialization

use anyhow::Result;
use proofsheet_core::Config;
use proofsheet_storage::{create_storage, Storage};
use std::sync::Arc;

pub async fn setup_storage(config: &Config) -> Result<Arc<dyn Storage>> {
    tracing::info!("Initializing storage abstraction...");
    let storage = create_storage(config).await?;
    tracing::info!(
        backend = %storage.backend_type(),
        raw_bucket = %config.raw_bucket(),
        processed_bucket = %config.processed_bucket(),
        "Storage abstraction initialized successfully"
    );
    Ok(storage)
}
