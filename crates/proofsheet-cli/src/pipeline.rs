//! Wiring an [`UploadOrchestrator`] for a live deployment or a local dry run.

use anyhow::{Context, Result};
use proofsheet_core::{Config, NoOpProcessingTrigger, ProcessingTrigger};
use proofsheet_processing::DerivativeGenerator;
use proofsheet_services::InProcessTrigger;
use proofsheet_storage::{ObjectStorage, Storage};
use proofsheet_upload::memory::{DirectGrants, InMemoryRecordStore, SimulatedTransport};
use proofsheet_upload::{
    HttpGrants, HttpProcessingTrigger, HttpTransport, OrchestratorSettings, Records,
    RestRecordStore, UploadOrchestrator,
};
use std::sync::Arc;

const DEFAULT_API_URL: &str = "http://localhost:4000";

/// PROOFSHEET_API_URL, falling back to a local API.
pub fn api_url_from_env() -> String {
    std::env::var("PROOFSHEET_API_URL")
        .unwrap_or_else(|_| DEFAULT_API_URL.to_string())
        .trim_end_matches('/')
        .to_string()
}

/// `POST {api_url}/process-image` after each upload, or nothing when the storage-insert
/// webhook already generates derivatives.
pub fn processing_trigger(api_url: &str, trigger_processing: bool) -> Result<Arc<dyn ProcessingTrigger>> {
    if trigger_processing {
        let trigger = HttpProcessingTrigger::new(format!("{}/process-image", api_url))?;
        Ok(Arc::new(trigger))
    } else {
        tracing::info!("Derivative generation left to the storage webhook");
        Ok(Arc::new(NoOpProcessingTrigger))
    }
}

/// Record store from RECORD_STORE_URL/RECORD_STORE_KEY; grants, uploads and processing
/// through the API at `api_url`.
pub fn live_orchestrator(
    api_url: &str,
    settings: OrchestratorSettings,
    trigger_processing: bool,
) -> Result<UploadOrchestrator> {
    let store = RestRecordStore::from_env()
        .context("Record store not configured. Set RECORD_STORE_URL and RECORD_STORE_KEY")?;
    let grants = HttpGrants::new(api_url)?;
    let transport = HttpTransport::new()?;
    let trigger = processing_trigger(api_url, trigger_processing)?;

    Ok(UploadOrchestrator::new(
        Records::new(Arc::new(store)),
        Arc::new(grants),
        Arc::new(transport),
        trigger,
        settings,
    ))
}

/// Everything in memory: records, storage, simulated transfers and the real generator.
pub struct DryRun {
    pub orchestrator: UploadOrchestrator,
    pub storage: Arc<dyn Storage>,
    pub records: Arc<InMemoryRecordStore>,
}

impl DryRun {
    pub fn new(config: &Config, settings: OrchestratorSettings) -> Self {
        let storage: Arc<dyn Storage> = Arc::new(ObjectStorage::in_memory(config.buckets()));
        let records = Arc::new(InMemoryRecordStore::new());
        let generator = Arc::new(DerivativeGenerator::from_config(storage.clone(), config));

        let orchestrator = UploadOrchestrator::new(
            Records::new(records.clone()),
            Arc::new(DirectGrants::new(config.raw_bucket())),
            Arc::new(SimulatedTransport::new(storage.clone())),
            Arc::new(InProcessTrigger::from_config(generator, config)),
            settings,
        );

        Self {
            orchestrator,
            storage,
            records,
        }
    }
}
