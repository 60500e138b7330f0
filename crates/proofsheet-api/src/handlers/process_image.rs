use crate::error::{HttpAppError, ValidatedJson};
use crate::state::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use proofsheet_core::models::{ProcessImageRequest, ProcessImageResponse};
use proofsheet_core::AppError;
use std::sync::Arc;

/// Generate every configured derivative for one original in the raw area.
///
/// `200` when nothing failed (including skipped and passthrough originals), `207` when some
/// widths failed. A missing or undecodable original is a `500`.
#[tracing::instrument(skip_all)]
pub async fn process_image(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<ProcessImageRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    tracing::debug!(original_path = %request.original_path, "Processing request received");

    let outcome = state
        .generator
        .process(
            state.config.raw_bucket(),
            &request.original_path,
            state.config.processed_bucket(),
        )
        .await
        .map_err(AppError::from)?;

    let status = StatusCode::from_u16(outcome.http_status()).unwrap_or(StatusCode::OK);
    Ok((status, Json(ProcessImageResponse::from(outcome))))
}
