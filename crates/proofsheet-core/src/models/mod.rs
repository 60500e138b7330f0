//! Data models for the pipeline
//!
//! Organized by stage: client-side upload queue, record-store rows, derivative
//! generation results and the JSON bodies exchanged over HTTP.

mod derivative;
mod upload;
mod variation;
mod webhook;

pub use derivative::*;
pub use upload::*;
pub use variation::*;
pub use webhook::*;
