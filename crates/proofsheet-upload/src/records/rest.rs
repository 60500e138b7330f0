use super::{RecordStore, RecordStoreError};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde_json::Value;
use std::time::Duration;
use uuid::Uuid;

/// Record store over a PostgREST-style HTTP interface.
///
/// Rows live at `{base_url}/{table}`; filters use `?id=eq.{id}`; the key is sent both as
/// `apikey` and as a bearer token.
#[derive(Clone, Debug)]
pub struct RestRecordStore {
    client: Client,
    base_url: String,
    api_key: String,
}

impl RestRecordStore {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        })
    }

    /// RECORD_STORE_URL and RECORD_STORE_KEY.
    pub fn from_env() -> Result<Self> {
        let base_url =
            std::env::var("RECORD_STORE_URL").context("Missing RECORD_STORE_URL")?;
        let api_key = std::env::var("RECORD_STORE_KEY").context("Missing RECORD_STORE_KEY")?;
        Self::new(base_url, api_key)
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/{}", self.base_url, table)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", self.api_key.as_str())
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    async fn first_row(
        response: Response,
        table: &str,
        id: Option<Uuid>,
    ) -> Result<Value, RecordStoreError> {
        let response = Self::check(response).await?;
        let rows: Vec<Value> = response
            .json()
            .await
            .map_err(|e| RecordStoreError::Decode(e.to_string()))?;

        match (rows.into_iter().next(), id) {
            (Some(row), _) => Ok(row),
            (None, Some(id)) => Err(RecordStoreError::NotFound {
                table: table.to_string(),
                id,
            }),
            (None, None) => Err(RecordStoreError::Decode(format!(
                "insert into {} returned no row",
                table
            ))),
        }
    }

    async fn check(response: Response) -> Result<Response, RecordStoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(RecordStoreError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl RecordStore for RestRecordStore {
    async fn insert(&self, table: &str, row: Value) -> Result<Value, RecordStoreError> {
        let response = self
            .request(reqwest::Method::POST, &self.table_url(table))
            .header("Prefer", "return=representation")
            .json(&row)
            .send()
            .await
            .map_err(|e| RecordStoreError::Request(e.to_string()))?;

        Self::first_row(response, table, None).await
    }

    async fn update(&self, table: &str, id: Uuid, patch: Value) -> Result<Value, RecordStoreError> {
        let response = self
            .request(reqwest::Method::PATCH, &self.table_url(table))
            .query(&[("id", format!("eq.{}", id))])
            .header("Prefer", "return=representation")
            .json(&patch)
            .send()
            .await
            .map_err(|e| RecordStoreError::Request(e.to_string()))?;

        Self::first_row(response, table, Some(id)).await
    }

    async fn delete(&self, table: &str, id: Uuid) -> Result<(), RecordStoreError> {
        let response = self
            .request(reqwest::Method::DELETE, &self.table_url(table))
            .query(&[("id", format!("eq.{}", id))])
            .send()
            .await
            .map_err(|e| RecordStoreError::Request(e.to_string()))?;

        Self::check(response).await?;
        Ok(())
    }
}
