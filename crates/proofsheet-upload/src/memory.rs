//! In-process stand-ins for the record store, grant endpoint and transport.
//!
//! Used by the CLI dry run and by tests. The simulated transport writes the bytes into a
//! [`Storage`] bucket, so the rest of the pipeline (processing, cleanup) sees real objects.

use crate::grants::{GrantError, UploadGrants};
use crate::records::{RecordStore, RecordStoreError};
use crate::transport::{MonotonicProgress, ProgressFn, TransferOutcome, TransportError, UploadTransport};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use proofsheet_core::models::UploadGrantResponse;
use proofsheet_storage::Storage;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

const MEMORY_SCHEME: &str = "memory://";

/// A rule that makes matching writes fail.
#[derive(Debug, Clone)]
struct FailRule {
    table: String,
    field: Option<(String, Value)>,
}

impl FailRule {
    fn matches(&self, table: &str, row: Option<&Value>) -> bool {
        if self.table != table {
            return false;
        }
        match (&self.field, row) {
            (None, _) => true,
            (Some((field, value)), Some(row)) => row.get(field) == Some(value),
            (Some(_), None) => false,
        }
    }
}

/// Record store holding rows in memory, with failure injection.
#[derive(Default)]
pub struct InMemoryRecordStore {
    tables: Mutex<HashMap<String, Vec<Value>>>,
    failing_inserts: Mutex<Vec<FailRule>>,
    failing_updates: Mutex<Vec<FailRule>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail inserts into `table` whose row has `field == value`.
    pub fn fail_inserts_where(&self, table: &str, field: &str, value: impl Into<Value>) {
        if let Ok(mut rules) = self.failing_inserts.lock() {
            rules.push(FailRule {
                table: table.to_string(),
                field: Some((field.to_string(), value.into())),
            });
        }
    }

    /// Fail every insert into `table`.
    pub fn fail_inserts(&self, table: &str) {
        if let Ok(mut rules) = self.failing_inserts.lock() {
            rules.push(FailRule {
                table: table.to_string(),
                field: None,
            });
        }
    }

    /// Fail every update of `table`.
    pub fn fail_updates(&self, table: &str) {
        if let Ok(mut rules) = self.failing_updates.lock() {
            rules.push(FailRule {
                table: table.to_string(),
                field: None,
            });
        }
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.tables
            .lock()
            .map(|tables| tables.get(table).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    pub fn get(&self, table: &str, id: Uuid) -> Option<Value> {
        self.rows(table)
            .into_iter()
            .find(|row| row_id(row) == Some(id))
    }

    fn should_fail(rules: &Mutex<Vec<FailRule>>, table: &str, row: Option<&Value>) -> bool {
        rules
            .lock()
            .map(|rules| rules.iter().any(|rule| rule.matches(table, row)))
            .unwrap_or(false)
    }
}

fn row_id(row: &Value) -> Option<Uuid> {
    row.get("id")
        .and_then(Value::as_str)
        .and_then(|id| Uuid::parse_str(id).ok())
}

fn poisoned() -> RecordStoreError {
    RecordStoreError::Request("record store lock poisoned".to_string())
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn insert(&self, table: &str, mut row: Value) -> Result<Value, RecordStoreError> {
        if Self::should_fail(&self.failing_inserts, table, Some(&row)) {
            return Err(RecordStoreError::Rejected {
                status: 500,
                message: format!("insert into {} refused", table),
            });
        }

        let Some(fields) = row.as_object_mut() else {
            return Err(RecordStoreError::Rejected {
                status: 400,
                message: "row must be a JSON object".to_string(),
            });
        };
        fields
            .entry("id")
            .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
        fields
            .entry("created_at")
            .or_insert_with(|| Value::String(Utc::now().to_rfc3339()));

        let mut tables = self.tables.lock().map_err(|_| poisoned())?;
        tables.entry(table.to_string()).or_default().push(row.clone());
        Ok(row)
    }

    async fn update(&self, table: &str, id: Uuid, patch: Value) -> Result<Value, RecordStoreError> {
        if Self::should_fail(&self.failing_updates, table, None) {
            return Err(RecordStoreError::Rejected {
                status: 500,
                message: format!("update of {} refused", table),
            });
        }

        let mut tables = self.tables.lock().map_err(|_| poisoned())?;
        let row = tables
            .get_mut(table)
            .and_then(|rows| rows.iter_mut().find(|row| row_id(row) == Some(id)))
            .ok_or_else(|| RecordStoreError::NotFound {
                table: table.to_string(),
                id,
            })?;

        if let (Some(fields), Some(changes)) = (row.as_object_mut(), patch.as_object()) {
            for (key, value) in changes {
                fields.insert(key.clone(), value.clone());
            }
        }
        Ok(row.clone())
    }

    async fn delete(&self, table: &str, id: Uuid) -> Result<(), RecordStoreError> {
        let mut tables = self.tables.lock().map_err(|_| poisoned())?;
        if let Some(rows) = tables.get_mut(table) {
            rows.retain(|row| row_id(row) != Some(id));
        }
        Ok(())
    }
}

/// Grants `memory://{bucket}/{path}` URLs understood by [`SimulatedTransport`].
pub struct DirectGrants {
    bucket: String,
}

impl DirectGrants {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl UploadGrants for DirectGrants {
    async fn grant(&self, path: &str) -> Result<UploadGrantResponse, GrantError> {
        Ok(UploadGrantResponse {
            url: format!("{}{}/{}", MEMORY_SCHEME, self.bucket, path),
            bucket: self.bucket.clone(),
            path: path.to_string(),
            expires_at: Utc::now() + chrono::Duration::hours(2),
        })
    }
}

/// Transport that "sends" a body in timed steps and stores it on completion.
pub struct SimulatedTransport {
    storage: Arc<dyn Storage>,
    steps: u32,
    step_delay: Duration,
    fail_suffix: Mutex<Option<String>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    transfers: AtomicUsize,
}

impl SimulatedTransport {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self {
            storage,
            steps: 4,
            step_delay: Duration::from_millis(5),
            fail_suffix: Mutex::new(None),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            transfers: AtomicUsize::new(0),
        }
    }

    pub fn with_timing(mut self, steps: u32, step_delay: Duration) -> Self {
        self.steps = steps.max(1);
        self.step_delay = step_delay;
        self
    }

    /// Reject transfers whose URL ends with `suffix` with a 403.
    pub fn fail_urls_ending_with(&self, suffix: &str) {
        if let Ok(mut fail) = self.fail_suffix.lock() {
            *fail = Some(suffix.to_string());
        }
    }

    /// Most transfers that were ever running at once.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// Transfers started, including failed and cancelled ones.
    pub fn transfers(&self) -> usize {
        self.transfers.load(Ordering::SeqCst)
    }

    fn parse(url: &str) -> Result<(&str, &str), TransportError> {
        url.strip_prefix(MEMORY_SCHEME)
            .and_then(|rest| rest.split_once('/'))
            .ok_or_else(|| TransportError::new(None, format!("unsupported URL: {}", url)))
    }

    async fn run(
        &self,
        url: &str,
        body: Bytes,
        content_type: &str,
        progress: &MonotonicProgress,
        cancel: &CancellationToken,
    ) -> Result<TransferOutcome, TransportError> {
        let (bucket, path) = Self::parse(url)?;
        let total = body.len() as u64;

        for step in 1..=self.steps {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Ok(TransferOutcome::Cancelled),
                _ = tokio::time::sleep(self.step_delay) => {}
            }
            progress.report(total * step as u64 / self.steps as u64, total);
        }

        let failing = self
            .fail_suffix
            .lock()
            .ok()
            .and_then(|suffix| suffix.clone())
            .is_some_and(|suffix| url.ends_with(&suffix));
        if failing {
            return Err(TransportError::new(Some(403), "simulated rejection"));
        }

        self.storage
            .upload(bucket, path, body, content_type, false)
            .await
            .map_err(|e| TransportError::new(Some(409), e.to_string()))?;
        progress.finish();
        Ok(TransferOutcome::Completed)
    }
}

#[async_trait]
impl UploadTransport for SimulatedTransport {
    async fn transfer(
        &self,
        url: &str,
        body: Bytes,
        content_type: &str,
        on_progress: ProgressFn,
        cancel: CancellationToken,
    ) -> Result<TransferOutcome, TransportError> {
        self.transfers.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let progress = MonotonicProgress::new(on_progress);
        let result = self.run(url, body, content_type, &progress, &cancel).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}
