use super::{MonotonicProgress, ProgressFn, TransferOutcome, TransportError, UploadTransport};
use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use reqwest::{Body, Client};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Streams the body as one PUT, reporting progress per chunk handed to the connection.
#[derive(Clone, Debug)]
pub struct HttpTransport {
    client: Client,
    chunk_size: usize,
}

impl HttpTransport {
    pub fn new() -> anyhow::Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: Client) -> Self {
        Self {
            client,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    fn chunks(&self, body: &Bytes) -> Vec<Bytes> {
        (0..body.len())
            .step_by(self.chunk_size)
            .map(|start| body.slice(start..(start + self.chunk_size).min(body.len())))
            .collect()
    }
}

#[async_trait]
impl UploadTransport for HttpTransport {
    #[tracing::instrument(skip(self, body, on_progress, cancel), fields(size_bytes = body.len()))]
    async fn transfer(
        &self,
        url: &str,
        body: Bytes,
        content_type: &str,
        on_progress: ProgressFn,
        cancel: CancellationToken,
    ) -> Result<TransferOutcome, TransportError> {
        if cancel.is_cancelled() {
            return Ok(TransferOutcome::Cancelled);
        }

        let total = body.len() as u64;
        let progress = MonotonicProgress::new(on_progress);
        progress.report(0, total);

        let chunk_progress = progress.clone();
        let mut sent = 0u64;
        let body_stream = stream::iter(self.chunks(&body)).map(move |chunk| {
            sent += chunk.len() as u64;
            chunk_progress.report(sent, total);
            Ok::<Bytes, std::io::Error>(chunk)
        });

        let request = self
            .client
            .put(url)
            .header(CONTENT_TYPE, content_type)
            .header(CONTENT_LENGTH, total)
            .body(Body::wrap_stream(body_stream))
            .send();

        let start = Instant::now();
        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(size_bytes = total, "Upload cancelled");
                return Ok(TransferOutcome::Cancelled);
            }
            response = request => response,
        };

        let response = response.map_err(|e| {
            TransportError::new(e.status().map(|s| s.as_u16()), e.to_string())
        })?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| status.to_string());
            tracing::warn!(status = status.as_u16(), message = %message, "Upload rejected");
            return Err(TransportError::new(Some(status.as_u16()), message));
        }

        progress.finish();
        tracing::debug!(
            size_bytes = total,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Upload completed"
        );
        Ok(TransferOutcome::Completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunks_cover_body() {
        let transport = HttpTransport::with_client(Client::new()).with_chunk_size(4);
        let body = Bytes::from_static(b"0123456789");
        let chunks = transport.chunks(&body);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks.concat(), body.to_vec());
    }
}
