//! Proofsheet services
//!
//! Storage reclamation after entity deletion and the in-process processing trigger.

pub mod cleanup;
pub mod trigger;

pub use cleanup::{BucketCleanup, CleanupError, CleanupReport, CleanupService};
pub use trigger::InProcessTrigger;
