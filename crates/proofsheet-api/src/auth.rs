//! Shared-secret check for provider webhooks

use crate::error::HttpAppError;
use crate::state::AppState;
use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use proofsheet_core::constants::WEBHOOK_SECRET_HEADER;
use proofsheet_core::AppError;
use std::sync::Arc;
use subtle::ConstantTimeEq;

fn secure_compare(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

/// Reject webhook calls whose secret header does not match `WEBHOOK_SECRET`.
/// Without a configured secret every call passes.
pub async fn webhook_secret_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, HttpAppError> {
    if let Some(expected) = state.config.webhook_secret() {
        let provided = request
            .headers()
            .get(WEBHOOK_SECRET_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();

        if !secure_compare(provided, expected) {
            tracing::warn!(path = %request.uri().path(), "Webhook secret mismatch");
            return Err(AppError::Unauthorized("missing or invalid webhook secret".to_string()).into());
        }
    }

    Ok(next.run(request).await)
}
