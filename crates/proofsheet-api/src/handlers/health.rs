use crate::state::AppState;
use axum::{extract::State, Json};
use proofsheet_core::StorageBackend;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub storage_backend: StorageBackend,
    pub raw_bucket: String,
    pub processed_bucket: String,
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        storage_backend: state.storage.backend_type(),
        raw_bucket: state.config.raw_bucket().to_string(),
        processed_bucket: state.config.processed_bucket().to_string(),
    })
}
