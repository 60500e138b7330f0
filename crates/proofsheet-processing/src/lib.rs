//! Proofsheet Processing Library
//!
//! Derivative generation for uploaded originals:
//! - Decoding and aspect-preserving downscaling (resize)
//! - Lossy re-encoding at a fixed quality (compression)
//! - The per-original generator that writes every configured width (generator)

pub mod compression;
pub mod error;
pub mod generator;
pub mod resize;

pub use compression::ImageCompressor;
pub use error::ProcessingError;
pub use generator::DerivativeGenerator;
pub use resize::{fit_to_width, ImageResize};
