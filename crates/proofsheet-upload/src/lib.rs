//! Proofsheet upload client
//!
//! Creates one variation record per file, streams each file to a signed URL in the raw
//! bucket with a bounded number of transfers in flight, patches the record once the bytes
//! are stored and then fires derivative generation.

pub mod error;
pub mod grants;
pub mod memory;
pub mod orchestrator;
pub mod records;
pub mod scheduler;
pub mod transport;
pub mod trigger;

pub use error::UploadError;
pub use grants::{GrantError, HttpGrants, StorageGrants, UploadGrants};
pub use orchestrator::{
    BatchContext, BatchHandle, BatchReport, ItemOutcome, OrchestratorSettings, UploadOrchestrator,
    VersionTarget,
};
pub use records::{RecordStore, RecordStoreError, Records, RestRecordStore};
pub use scheduler::{run_bounded, Settled};
pub use transport::{HttpTransport, ProgressFn, TransferOutcome, TransportError, UploadTransport};
pub use trigger::HttpProcessingTrigger;
