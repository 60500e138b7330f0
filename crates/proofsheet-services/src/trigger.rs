//! Processing trigger that runs the derivative generator in this process.

use async_trait::async_trait;
use proofsheet_core::{Config, ProcessingTrigger, TriggerAck, TriggerError};
use proofsheet_processing::DerivativeGenerator;
use std::sync::Arc;

pub struct InProcessTrigger {
    generator: Arc<DerivativeGenerator>,
    raw_bucket: String,
    processed_bucket: String,
}

impl InProcessTrigger {
    pub fn new(
        generator: Arc<DerivativeGenerator>,
        raw_bucket: impl Into<String>,
        processed_bucket: impl Into<String>,
    ) -> Self {
        Self {
            generator,
            raw_bucket: raw_bucket.into(),
            processed_bucket: processed_bucket.into(),
        }
    }

    pub fn from_config(generator: Arc<DerivativeGenerator>, config: &Config) -> Self {
        Self::new(generator, config.raw_bucket(), config.processed_bucket())
    }
}

#[async_trait]
impl ProcessingTrigger for InProcessTrigger {
    async fn trigger(&self, original_path: &str) -> Result<TriggerAck, TriggerError> {
        let outcome = self
            .generator
            .process(&self.raw_bucket, original_path, &self.processed_bucket)
            .await
            .map_err(|e| TriggerError::Failed(e.to_string()))?;

        Ok(TriggerAck {
            status: outcome.http_status(),
            failed_widths: outcome.failed_widths(),
        })
    }
}
