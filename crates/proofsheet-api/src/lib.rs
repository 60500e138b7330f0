//! Proofsheet API Library
//!
//! HTTP surface of the pipeline: the derivative trigger endpoint, the storage and deletion
//! webhooks, upload grants and health.

mod auth;
mod handlers;
mod telemetry;

pub mod error;
pub mod setup;
pub mod state;

pub use error::{ErrorResponse, HttpAppError};
pub use state::AppState;
