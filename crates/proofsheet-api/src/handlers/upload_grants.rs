use crate::error::{HttpAppError, ValidatedJson};
use crate::state::AppState;
use axum::{extract::State, Json};
use proofsheet_core::constants::PROJECTS_ROOT;
use proofsheet_core::models::{UploadGrantRequest, UploadGrantResponse};
use proofsheet_core::paths::validate_object_path;
use proofsheet_core::{AppError, FormatPolicy};
use std::sync::Arc;

/// Issue a signed PUT URL for one raw object path.
#[tracing::instrument(skip_all, fields(path = %request.path))]
pub async fn create_upload_grant(
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<UploadGrantRequest>,
) -> Result<Json<UploadGrantResponse>, HttpAppError> {
    validate_raw_path(&request.path, &state.config.format_policy())?;

    let grant = state.grants.grant(&request.path).await?;
    tracing::info!(bucket = %grant.bucket, expires_at = %grant.expires_at, "Upload grant issued");
    Ok(Json(grant))
}

fn validate_raw_path(path: &str, policy: &FormatPolicy) -> Result<(), AppError> {
    validate_object_path(path)?;
    let under_projects = path
        .strip_prefix(PROJECTS_ROOT)
        .is_some_and(|rest| rest.starts_with('/'));
    if !under_projects {
        return Err(AppError::Validation(format!(
            "raw paths must live under {}/: {}",
            PROJECTS_ROOT, path
        )));
    }
    policy.check(path)
}
