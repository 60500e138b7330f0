use proofsheet_core::{Config, ProcessingTrigger};
use proofsheet_processing::DerivativeGenerator;
use proofsheet_services::{CleanupService, InProcessTrigger};
use proofsheet_storage::Storage;
use proofsheet_upload::{HttpProcessingTrigger, StorageGrants, UploadGrants};
use std::sync::Arc;

/// Shared application state handed to every handler.
pub struct AppState {
    pub config: Config,
    pub storage: Arc<dyn Storage>,
    pub generator: Arc<DerivativeGenerator>,
    pub cleanup: CleanupService,
    /// Where the storage-insert webhook sends new originals.
    pub forwarder: Arc<dyn ProcessingTrigger>,
    pub grants: Arc<dyn UploadGrants>,
}

impl AppState {
    pub fn new(config: Config, storage: Arc<dyn Storage>) -> anyhow::Result<Self> {
        let generator = Arc::new(DerivativeGenerator::from_config(storage.clone(), &config));
        let cleanup = CleanupService::from_config(storage.clone(), &config);

        let forwarder: Arc<dyn ProcessingTrigger> = match config.process_image_url() {
            Some(url) => {
                tracing::info!(url = %url, "Forwarding storage inserts over HTTP");
                Arc::new(HttpProcessingTrigger::new(url)?)
            }
            None => Arc::new(InProcessTrigger::from_config(generator.clone(), &config)),
        };

        let grants = Arc::new(StorageGrants::new(
            storage.clone(),
            config.raw_bucket(),
            config.upload_grant_ttl(),
        ));

        Ok(Self {
            config,
            storage,
            generator,
            cleanup,
            forwarder,
            grants,
        })
    }

    /// Replace the forwarder used by the storage-insert webhook.
    pub fn with_forwarder(mut self, forwarder: Arc<dyn ProcessingTrigger>) -> Self {
        self.forwarder = forwarder;
        self
    }
}
