//! Upload grants: time-boxed signed PUT URLs for one raw object path.

use anyhow::Context;
use async_trait::async_trait;
use chrono::Utc;
use proofsheet_core::models::{UploadGrantRequest, UploadGrantResponse};
use proofsheet_storage::{Storage, StorageError};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GrantError {
    #[error("storage refused the grant: {0}")]
    Storage(#[from] StorageError),

    #[error("grant endpoint returned {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("grant request failed: {0}")]
    Request(String),
}

#[async_trait]
pub trait UploadGrants: Send + Sync {
    async fn grant(&self, path: &str) -> Result<UploadGrantResponse, GrantError>;
}

/// Signs URLs with the storage client's own credentials.
pub struct StorageGrants {
    storage: Arc<dyn Storage>,
    bucket: String,
    ttl: Duration,
}

impl StorageGrants {
    pub fn new(storage: Arc<dyn Storage>, bucket: impl Into<String>, ttl: Duration) -> Self {
        Self {
            storage,
            bucket: bucket.into(),
            ttl,
        }
    }
}

#[async_trait]
impl UploadGrants for StorageGrants {
    async fn grant(&self, path: &str) -> Result<UploadGrantResponse, GrantError> {
        let url = self
            .storage
            .create_upload_grant(&self.bucket, path, self.ttl)
            .await?;
        let ttl = chrono::Duration::from_std(self.ttl).unwrap_or_else(|_| chrono::Duration::hours(2));

        Ok(UploadGrantResponse {
            url,
            bucket: self.bucket.clone(),
            path: path.to_string(),
            expires_at: Utc::now() + ttl,
        })
    }
}

/// Asks the API's `POST /upload-grants` for a URL, so the client needs no storage credentials.
#[derive(Clone, Debug)]
pub struct HttpGrants {
    client: Client,
    endpoint: String,
}

impl HttpGrants {
    pub fn new(api_base_url: &str) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint: format!("{}/upload-grants", api_base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait]
impl UploadGrants for HttpGrants {
    async fn grant(&self, path: &str) -> Result<UploadGrantResponse, GrantError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&UploadGrantRequest {
                path: path.to_string(),
            })
            .send()
            .await
            .map_err(|e| GrantError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(GrantError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json()
            .await
            .map_err(|e| GrantError::Request(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proofsheet_storage::ObjectStorage;

    #[tokio::test]
    async fn test_storage_without_signer_refuses_grant() {
        let storage = Arc::new(ObjectStorage::in_memory(["raw"]));
        let grants = StorageGrants::new(storage, "raw", Duration::from_secs(60));
        let err = grants.grant("projects/p/a.png").await.unwrap_err();
        assert!(matches!(err, GrantError::Storage(StorageError::ConfigError(_))));
    }
}
