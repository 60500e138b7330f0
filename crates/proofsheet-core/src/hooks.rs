//! Hooks for starting derivative generation
//!
//! The upload orchestrator fires a processing trigger once an original has landed in the
//! raw area. Where the trigger lands (an HTTP endpoint, an in-process generator, nothing)
//! is decided by whoever wires the orchestrator up.

use async_trait::async_trait;

/// Acknowledgement returned by a processing trigger.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TriggerAck {
    /// HTTP-style status: 200 complete, 207 partial.
    pub status: u16,
    /// Widths whose derivative failed, when the trigger reports them.
    pub failed_widths: Vec<u32>,
}

impl TriggerAck {
    pub fn complete() -> Self {
        Self {
            status: 200,
            failed_widths: Vec::new(),
        }
    }

    pub fn is_partial(&self) -> bool {
        self.status == 207 || !self.failed_widths.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TriggerError {
    #[error("processing endpoint returned {status}: {message}")]
    Rejected { status: u16, message: String },

    #[error("processing endpoint unreachable: {0}")]
    Unreachable(String),

    #[error("processing failed: {0}")]
    Failed(String),
}

/// Start derivative generation for an original in the raw area.
#[async_trait]
pub trait ProcessingTrigger: Send + Sync {
    async fn trigger(&self, original_path: &str) -> Result<TriggerAck, TriggerError>;
}

/// No-op implementation for when derivatives are produced elsewhere (e.g. by the storage webhook).
pub struct NoOpProcessingTrigger;

#[async_trait]
impl ProcessingTrigger for NoOpProcessingTrigger {
    async fn trigger(&self, _original_path: &str) -> Result<TriggerAck, TriggerError> {
        Ok(TriggerAck::complete())
    }
}
