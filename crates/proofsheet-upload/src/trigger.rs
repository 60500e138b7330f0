use anyhow::Context;
use async_trait::async_trait;
use proofsheet_core::models::{ProcessImageRequest, ProcessImageResponse};
use proofsheet_core::{ProcessingTrigger, TriggerAck, TriggerError};
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// Calls `POST /process-image` and waits for its verdict.
#[derive(Clone, Debug)]
pub struct HttpProcessingTrigger {
    client: Client,
    url: String,
}

impl HttpProcessingTrigger {
    pub fn new(url: impl Into<String>) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl ProcessingTrigger for HttpProcessingTrigger {
    async fn trigger(&self, original_path: &str) -> Result<TriggerAck, TriggerError> {
        let response = self
            .client
            .post(&self.url)
            .json(&ProcessImageRequest {
                original_path: original_path.to_string(),
            })
            .send()
            .await
            .map_err(|e| TriggerError::Unreachable(e.to_string()))?;

        let status = response.status();
        match status {
            StatusCode::OK | StatusCode::MULTI_STATUS => {
                let failed_widths = response
                    .json::<ProcessImageResponse>()
                    .await
                    .map(|body| body.failed_widths)
                    .unwrap_or_default();
                Ok(TriggerAck {
                    status: status.as_u16(),
                    failed_widths,
                })
            }
            _ => {
                let message = response
                    .text()
                    .await
                    .unwrap_or_else(|_| "Unknown error".to_string());
                Err(TriggerError::Rejected {
                    status: status.as_u16(),
                    message,
                })
            }
        }
    }
}
