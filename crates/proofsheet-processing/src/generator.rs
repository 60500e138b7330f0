//! Derivative generator
//!
//! Turns one original in the raw bucket into its derivatives in the processed bucket.
//! Output paths come from the [`PathDeriver`], so re-running for the same original
//! overwrites the same objects.

use crate::compression::ImageCompressor;
use crate::error::ProcessingError;
use crate::resize::ImageResize;
use futures::future::join_all;
use image::DynamicImage;
use proofsheet_core::formats::content_type_for_path;
use proofsheet_core::models::{BatchOutcome, BatchStatus, DerivativeSpec, ProcessingOutcome};
use proofsheet_core::paths::validate_object_path;
use proofsheet_core::{Config, FormatPolicy, ImageKind, PathDeriver};
use proofsheet_storage::Storage;
use std::sync::Arc;
use std::time::Instant;

pub struct DerivativeGenerator {
    storage: Arc<dyn Storage>,
    specs: Vec<DerivativeSpec>,
    quality: u8,
    policy: FormatPolicy,
    deriver: PathDeriver,
}

impl DerivativeGenerator {
    pub fn new(
        storage: Arc<dyn Storage>,
        specs: Vec<DerivativeSpec>,
        quality: u8,
        policy: FormatPolicy,
        deriver: PathDeriver,
    ) -> Self {
        Self {
            storage,
            specs,
            quality,
            policy,
            deriver,
        }
    }

    pub fn from_config(storage: Arc<dyn Storage>, config: &Config) -> Self {
        Self::new(
            storage,
            config.derivative_specs(),
            config.derivative_quality(),
            config.format_policy(),
            config.path_deriver(),
        )
    }

    pub fn specs(&self) -> &[DerivativeSpec] {
        &self.specs
    }

    /// Produce every derivative for `original_path`.
    ///
    /// Download and decode failures are fatal. A failed width is reported in the outcome
    /// and does not stop the others.
    #[tracing::instrument(skip(self), fields(widths = ?self.specs.iter().map(|s| s.target_width).collect::<Vec<_>>()))]
    pub async fn process(
        &self,
        original_bucket: &str,
        original_path: &str,
        target_bucket: &str,
    ) -> Result<BatchOutcome, ProcessingError> {
        validate_object_path(original_path)
            .map_err(|e| ProcessingError::InvalidPath(e.to_string()))?;

        let kind = self.policy.classify(original_path);
        if kind == ImageKind::Unsupported {
            tracing::info!(path = %original_path, "Unsupported format, skipping");
            return Ok(BatchOutcome::skipped(original_path));
        }

        let start = Instant::now();
        let original = self
            .storage
            .download(original_bucket, original_path)
            .await
            .map_err(|source| ProcessingError::Download {
                path: original_path.to_string(),
                source,
            })?;

        if kind == ImageKind::Passthrough {
            let target_path = self.deriver.derive(original_path, None);
            self.storage
                .upload(
                    target_bucket,
                    &target_path,
                    original,
                    content_type_for_path(original_path),
                    true,
                )
                .await
                .map_err(|source| ProcessingError::PassthroughUpload {
                    path: target_path.clone(),
                    source,
                })?;

            tracing::info!(
                path = %original_path,
                target = %target_path,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Passthrough copy written"
            );

            return Ok(BatchOutcome {
                original_path: original_path.to_string(),
                status: BatchStatus::Passthrough,
                outcomes: vec![ProcessingOutcome::succeeded(target_path, None)],
            });
        }

        let img = tokio::task::spawn_blocking(move || ImageCompressor::decode(&original))
            .await
            .map_err(|e| ProcessingError::Task(e.to_string()))?
            .map_err(|e| ProcessingError::Decode {
                path: original_path.to_string(),
                message: e.to_string(),
            })?;
        let img = Arc::new(img);

        let outcomes = join_all(
            self.specs
                .iter()
                .map(|spec| self.render(Arc::clone(&img), original_path, *spec, target_bucket)),
        )
        .await;

        let outcome = BatchOutcome::from_outcomes(original_path, outcomes);
        if outcome.is_partial() {
            tracing::warn!(
                path = %original_path,
                failed_widths = ?outcome.failed_widths(),
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Some derivatives failed"
            );
        } else {
            tracing::info!(
                path = %original_path,
                count = outcome.outcomes.len(),
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Derivatives written"
            );
        }

        Ok(outcome)
    }

    async fn render(
        &self,
        img: Arc<DynamicImage>,
        original_path: &str,
        spec: DerivativeSpec,
        target_bucket: &str,
    ) -> ProcessingOutcome {
        let width = spec.target_width;
        let target_path = self.deriver.derive(original_path, Some(width));
        let quality = self.quality;

        let encoded = tokio::task::spawn_blocking(move || {
            let resized = ImageResize::to_width(&img, width);
            ImageCompressor::compress(&resized, spec.output_format, quality)
        })
        .await;

        let data = match encoded {
            Ok(Ok(data)) => data,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, width, target = %target_path, "Derivative encode failed");
                return ProcessingOutcome::failed(target_path, Some(width), e.to_string());
            }
            Err(e) => {
                tracing::error!(error = %e, width, target = %target_path, "Derivative task failed");
                return ProcessingOutcome::failed(target_path, Some(width), e.to_string());
            }
        };

        match self
            .storage
            .upload(
                target_bucket,
                &target_path,
                data,
                spec.output_format.content_type(),
                true,
            )
            .await
        {
            Ok(()) => ProcessingOutcome::succeeded(target_path, Some(width)),
            Err(e) => {
                tracing::warn!(error = %e, width, target = %target_path, "Derivative upload failed");
                ProcessingOutcome::failed(target_path, Some(width), e.to_string())
            }
        }
    }
}
