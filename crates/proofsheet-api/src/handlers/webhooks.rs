//! Provider webhooks: new originals in the raw area and deleted parent rows.

use crate::error::{HttpAppError, ValidatedJson};
use crate::state::AppState;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use proofsheet_core::constants::{EVENT_DELETE, EVENT_INSERT, STORAGE_OBJECTS_TABLE};
use proofsheet_core::models::{DeletionEvent, StorageInsertEvent};
use proofsheet_core::paths::validate_object_path;
use proofsheet_core::{AppError, ParentKind};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct WebhookAck {
    pub status: &'static str,
    #[serde(rename = "originalPath", skip_serializing_if = "Option::is_none")]
    pub original_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

fn ignored(reason: impl Into<String>) -> Response {
    let reason = reason.into();
    tracing::debug!(reason = %reason, "Webhook event ignored");
    (
        StatusCode::OK,
        Json(WebhookAck {
            status: "ignored",
            original_path: None,
            reason: Some(reason),
        }),
    )
        .into_response()
}

/// Forward a freshly inserted raw original to derivative generation and answer `202`
/// without waiting for it.
#[tracing::instrument(skip_all)]
pub async fn storage_insert(
    State(state): State<Arc<AppState>>,
    ValidatedJson(event): ValidatedJson<StorageInsertEvent>,
) -> Result<Response, HttpAppError> {
    if event.event_type != EVENT_INSERT || event.table != STORAGE_OBJECTS_TABLE {
        return Ok(ignored(format!("{} on {}", event.event_type, event.table)));
    }
    let record = event
        .record
        .ok_or_else(|| AppError::Validation("insert event is missing record".to_string()))?;
    if record.bucket_id != state.config.raw_bucket() {
        return Ok(ignored(format!("bucket {} is not watched", record.bucket_id)));
    }
    validate_object_path(&record.name)?;

    let forwarder = state.forwarder.clone();
    let original_path = record.name.clone();
    tokio::spawn(async move {
        match forwarder.trigger(&original_path).await {
            Ok(ack) if ack.is_partial() => tracing::warn!(
                original_path = %original_path,
                failed_widths = ?ack.failed_widths,
                "Derivatives partially generated"
            ),
            Ok(ack) => tracing::info!(
                original_path = %original_path,
                status = ack.status,
                "Derivatives generated"
            ),
            Err(e) => tracing::error!(
                original_path = %original_path,
                error = %e,
                "Forwarding to derivative generation failed"
            ),
        }
    });

    Ok((
        StatusCode::ACCEPTED,
        Json(WebhookAck {
            status: "accepted",
            original_path: Some(record.name),
            reason: None,
        }),
    )
        .into_response())
}

/// Reclaim the storage owned by a deleted project or design.
///
/// The row is already gone, so partial cleanup still answers `200`; the report says what
/// was left behind.
#[tracing::instrument(skip_all)]
pub async fn deletion(
    State(state): State<Arc<AppState>>,
    ValidatedJson(event): ValidatedJson<DeletionEvent>,
) -> Result<Response, HttpAppError> {
    if event.event_type != EVENT_DELETE {
        return Ok(ignored(format!("{} on {}", event.event_type, event.table)));
    }
    let Some(kind) = ParentKind::from_table(&event.table) else {
        return Ok(ignored(format!("table {} owns no storage", event.table)));
    };
    let old = event
        .old_record
        .ok_or_else(|| AppError::Validation("delete event is missing old_record".to_string()))?;

    let report = state
        .cleanup
        .cleanup_parent(kind, &old.id, old.project_id.as_deref())
        .await?;

    if !report.is_complete() {
        tracing::warn!(
            prefix = %report.prefix,
            deleted = report.deleted(),
            failed = report.failed(),
            "Cleanup left objects behind"
        );
    }

    Ok((StatusCode::OK, Json(report)).into_response())
}
