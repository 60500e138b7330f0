//! Byte transfer to a pre-authorized URL

mod http;

pub use http::HttpTransport;

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Receives the fraction of bytes sent, in `0.0..=1.0`.
pub type ProgressFn = Arc<dyn Fn(f32) + Send + Sync>;

/// How a transfer ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferOutcome {
    Completed,
    Cancelled,
}

/// Network failure or non-2xx response. `status` is `None` when no response arrived.
#[derive(Debug, Clone, Error)]
#[error("upload failed{}: {message}", status_suffix(.status))]
pub struct TransportError {
    pub status: Option<u16>,
    pub message: String,
}

impl TransportError {
    pub fn new(status: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({})", s)).unwrap_or_default()
}

#[async_trait]
pub trait UploadTransport: Send + Sync {
    /// Send `body` with a single PUT.
    ///
    /// Resolves to [`TransferOutcome::Cancelled`] once `cancel` fires; cancellation is not
    /// an error at this layer.
    async fn transfer(
        &self,
        url: &str,
        body: Bytes,
        content_type: &str,
        on_progress: ProgressFn,
        cancel: CancellationToken,
    ) -> Result<TransferOutcome, TransportError>;
}

/// Forwards progress only when it moves forward.
#[derive(Clone)]
pub(crate) struct MonotonicProgress {
    sink: ProgressFn,
    // Millionths of the total, so the comparison is a single atomic.
    high_water: Arc<AtomicU32>,
}

impl MonotonicProgress {
    pub(crate) fn new(sink: ProgressFn) -> Self {
        Self {
            sink,
            high_water: Arc::new(AtomicU32::new(0)),
        }
    }

    pub(crate) fn report(&self, sent: u64, total: u64) {
        let fraction = if total == 0 {
            1.0
        } else {
            (sent.min(total) as f64 / total as f64) as f32
        };
        let scaled = (fraction * 1_000_000.0) as u32;
        let previous = self.high_water.fetch_max(scaled, Ordering::AcqRel);
        if scaled > previous || (scaled == 0 && previous == 0) {
            (self.sink)(fraction);
        }
    }

    pub(crate) fn finish(&self) {
        self.report(1, 1);
    }
}
