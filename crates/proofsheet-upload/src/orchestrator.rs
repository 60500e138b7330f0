//! Upload orchestrator
//!
//! A batch goes through three phases:
//!
//! 1. Validation: files with a disallowed extension or over the size limit enter the queue
//!    already in `Error` and never get a record.
//! 2. Record creation, one item at a time: an item whose variation row cannot be created is
//!    marked `Error` and never transferred.
//! 3. Transfer under the bounded scheduler. A completed transfer patches the row with the
//!    raw path, removes the item from the visible queue and fires derivative generation
//!    without waiting for it.
//!
//! Queue snapshots are published through a `watch` channel; every change is a single
//! `send_modify` patch, so concurrent jobs never overwrite each other's updates.

use crate::error::UploadError;
use crate::grants::UploadGrants;
use crate::records::Records;
use crate::scheduler::run_bounded;
use crate::transport::{TransferOutcome, UploadTransport};
use proofsheet_core::formats::{content_type_for_path, extension_of};
use proofsheet_core::models::{
    NewVariation, SourceFile, UploadItem, UploadStatus, VariationStatus,
};
use proofsheet_core::{raw_object_path, variation_letter, Config, FormatPolicy, ProcessingTrigger};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Which version a batch's variations belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionTarget {
    Existing(Uuid),
    /// Insert a new `versions` row first; the batch aborts if that fails.
    NewVersion,
}

#[derive(Debug, Clone)]
pub struct BatchContext {
    pub project_id: Uuid,
    pub design_id: Uuid,
    pub version: VersionTarget,
    /// Letter index of the first accepted file (0 → `A`).
    pub first_letter_index: usize,
}

#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub policy: FormatPolicy,
    pub max_file_size_bytes: u64,
    pub concurrency: usize,
}

impl OrchestratorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            policy: config.format_policy(),
            max_file_size_bytes: config.max_file_size_bytes(),
            concurrency: config.upload_concurrency(),
        }
    }
}

/// Final state of one item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemOutcome {
    pub item_id: Uuid,
    pub file_name: String,
    pub letter: Option<String>,
    pub status: UploadStatus,
    pub record_id: Option<Uuid>,
    pub storage_path: Option<String>,
    pub error: Option<String>,
}

impl ItemOutcome {
    fn from_item(item: &UploadItem) -> Self {
        Self {
            item_id: item.id,
            file_name: item.file_name.clone(),
            letter: item.letter.clone(),
            status: item.status,
            record_id: item.record_id,
            storage_path: item.storage_path.clone(),
            error: item.error_message.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BatchReport {
    pub version_id: Uuid,
    /// One entry per submitted file, in submission order.
    pub items: Vec<ItemOutcome>,
    /// Processing triggers that failed or reported missing derivatives.
    pub warnings: Vec<String>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.count(UploadStatus::Success)
    }

    pub fn count(&self, status: UploadStatus) -> usize {
        self.items.iter().filter(|i| i.status == status).count()
    }

    pub fn all_succeeded(&self) -> bool {
        self.succeeded() == self.items.len()
    }
}

/// A batch's visible queue plus the items that have left it.
#[derive(Clone)]
struct Queue {
    visible: Arc<watch::Sender<Vec<UploadItem>>>,
    retired: Arc<Mutex<HashMap<Uuid, UploadItem>>>,
}

impl Queue {
    fn new(items: Vec<UploadItem>) -> Self {
        Self {
            visible: Arc::new(watch::Sender::new(items)),
            retired: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn patch(&self, id: Uuid, apply: impl FnOnce(&mut UploadItem)) {
        self.visible.send_modify(|items| {
            if let Some(item) = items.iter_mut().find(|item| item.id == id) {
                apply(item);
            }
        });
    }

    fn get(&self, id: Uuid) -> Option<UploadItem> {
        self.visible.borrow().iter().find(|item| item.id == id).cloned()
    }

    /// Apply a last patch and take the item out of the visible queue.
    fn retire(&self, id: Uuid, apply: impl FnOnce(&mut UploadItem)) {
        let mut removed = None;
        self.visible.send_modify(|items| {
            if let Some(position) = items.iter().position(|item| item.id == id) {
                let mut item = items.remove(position);
                apply(&mut item);
                removed = Some(item);
            }
        });
        if let (Some(item), Ok(mut retired)) = (removed, self.retired.lock()) {
            retired.insert(id, item);
        }
    }

    /// Current state of `id`, whether visible or retired.
    fn find(&self, id: Uuid) -> Option<UploadItem> {
        self.get(id).or_else(|| {
            self.retired
                .lock()
                .ok()
                .and_then(|retired| retired.get(&id).cloned())
        })
    }

    /// Move `id` from `from` to `to`. Returns false if it was in any other state.
    fn transition(&self, id: Uuid, from: UploadStatus, to: UploadStatus) -> bool {
        let mut moved = false;
        self.visible.send_if_modified(|items| {
            if let Some(item) = items
                .iter_mut()
                .find(|item| item.id == id && item.status == from)
            {
                item.status = to;
                moved = true;
            }
            moved
        });
        moved
    }

    fn fail(&self, id: Uuid, message: impl Into<String>) {
        let message = message.into();
        self.patch(id, |item| {
            item.status = UploadStatus::Error;
            item.error_message = Some(message);
        });
    }
}

/// Everything the transfer jobs share.
struct Shared {
    records: Records,
    grants: Arc<dyn UploadGrants>,
    transport: Arc<dyn UploadTransport>,
    trigger: Arc<dyn ProcessingTrigger>,
    queue: Queue,
    warnings: Arc<Mutex<Vec<String>>>,
}

impl Shared {
    fn warn(&self, message: String) {
        if let Ok(mut warnings) = self.warnings.lock() {
            warnings.push(message);
        }
    }
}

pub struct UploadOrchestrator {
    records: Records,
    grants: Arc<dyn UploadGrants>,
    transport: Arc<dyn UploadTransport>,
    trigger: Arc<dyn ProcessingTrigger>,
    settings: OrchestratorSettings,
}

impl UploadOrchestrator {
    pub fn new(
        records: Records,
        grants: Arc<dyn UploadGrants>,
        transport: Arc<dyn UploadTransport>,
        trigger: Arc<dyn ProcessingTrigger>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            records,
            grants,
            transport,
            trigger,
            settings,
        }
    }

    /// Accept a batch and start it in the background.
    ///
    /// Fails only for batch-level problems: an empty batch or a new version row that
    /// cannot be created. Per-file problems show up in the queue.
    #[tracing::instrument(skip(self, files), fields(files = files.len(), design_id = %context.design_id))]
    pub async fn submit_batch(
        &self,
        files: Vec<SourceFile>,
        context: BatchContext,
    ) -> Result<BatchHandle, UploadError> {
        if files.is_empty() {
            return Err(UploadError::Validation("no files selected".to_string()));
        }

        let mut items = Vec::with_capacity(files.len());
        let mut letter_index = context.first_letter_index;
        for file in &files {
            let mut item = UploadItem::pending(file);
            match self.check(file) {
                Ok(()) => {
                    item.letter = Some(variation_letter(letter_index));
                    letter_index += 1;
                }
                Err(message) => {
                    tracing::warn!(file_name = %file.name, reason = %message, "File rejected");
                    item.status = UploadStatus::Error;
                    item.error_message = Some(message);
                }
            }
            items.push(item);
        }

        let version_id = match context.version {
            VersionTarget::Existing(id) => id,
            VersionTarget::NewVersion => {
                let version = self
                    .records
                    .create_version(context.design_id)
                    .await
                    .map_err(|e| {
                        tracing::error!(error = %e, "Failed to create version, batch aborted");
                        e
                    })?;
                tracing::info!(version_id = %version.id, "Created version for batch");
                version.id
            }
        };

        let order: Vec<Uuid> = items.iter().map(|item| item.id).collect();
        let cancels: HashMap<Uuid, CancellationToken> = items
            .iter()
            .map(|item| (item.id, CancellationToken::new()))
            .collect();
        let cancels = Arc::new(cancels);
        let queue = Queue::new(items.clone());
        let warnings = Arc::new(Mutex::new(Vec::new()));

        let shared = Arc::new(Shared {
            records: self.records.clone(),
            grants: self.grants.clone(),
            transport: self.transport.clone(),
            trigger: self.trigger.clone(),
            queue: queue.clone(),
            warnings: warnings.clone(),
        });

        let jobs: Vec<Job> = items
            .into_iter()
            .zip(files)
            .filter(|(item, _)| item.status == UploadStatus::Pending)
            .map(|(item, file)| Job {
                cancel: cancels
                    .get(&item.id)
                    .cloned()
                    .unwrap_or_else(CancellationToken::new),
                item_id: item.id,
                letter: item.letter.unwrap_or_default(),
                file,
            })
            .collect();

        let task = tokio::spawn(run_batch(
            shared,
            jobs,
            context,
            version_id,
            self.settings.concurrency,
        ));

        Ok(BatchHandle {
            version_id,
            order,
            queue,
            cancels,
            warnings,
            task,
        })
    }

    fn check(&self, file: &SourceFile) -> Result<(), String> {
        self.settings
            .policy
            .check(&file.name)
            .map_err(|e| e.to_string())?;
        if file.size() > self.settings.max_file_size_bytes {
            return Err(format!(
                "{} is {} bytes, the limit is {} bytes",
                file.name,
                file.size(),
                self.settings.max_file_size_bytes
            ));
        }
        Ok(())
    }
}

struct Job {
    item_id: Uuid,
    letter: String,
    file: SourceFile,
    cancel: CancellationToken,
}

/// A job with its variation row in place.
struct ReadyJob {
    job: Job,
    variation_id: Uuid,
    storage_path: String,
}

async fn run_batch(
    shared: Arc<Shared>,
    jobs: Vec<Job>,
    context: BatchContext,
    version_id: Uuid,
    concurrency: usize,
) -> Vec<JoinHandle<()>> {
    // Records first, sequentially; no bytes move for an item without a row.
    let mut ready = Vec::with_capacity(jobs.len());
    for job in jobs {
        if job.cancel.is_cancelled() {
            mark_cancelled(&shared.queue, job.item_id);
            continue;
        }
        let variation = NewVariation {
            version_id,
            letter: job.letter.clone(),
            status: VariationStatus::Pending,
            file_name: job.file.name.clone(),
            mime_type: job.file.mime_type.clone(),
            size_bytes: job.file.size(),
        };
        match shared.records.create_variation(&variation).await {
            Ok(record) => {
                let extension = extension_of(&job.file.name).unwrap_or_default();
                let storage_path = raw_object_path(
                    context.project_id,
                    context.design_id,
                    version_id,
                    record.id,
                    &extension,
                );
                shared.queue.patch(job.item_id, |item| item.record_id = Some(record.id));
                ready.push(ReadyJob {
                    job,
                    variation_id: record.id,
                    storage_path,
                });
            }
            Err(e) => {
                tracing::error!(error = %e, item_id = %job.item_id, "Failed to create variation record");
                shared
                    .queue
                    .fail(job.item_id, format!("could not create record: {}", e));
            }
        }
    }

    let runs = ready.into_iter().map(|ready| {
        let shared = shared.clone();
        async move { Ok::<_, std::convert::Infallible>(transfer_item(shared, ready).await) }
    });
    run_bounded(runs, concurrency)
        .await
        .into_iter()
        .filter_map(|settled| settled.into_result().ok().flatten())
        .collect()
}

/// Drive one item to a terminal state. Returns the spawned trigger task on success.
async fn transfer_item(shared: Arc<Shared>, ready: ReadyJob) -> Option<JoinHandle<()>> {
    let ReadyJob {
        job,
        variation_id,
        storage_path,
    } = ready;
    let item_id = job.item_id;

    if job.cancel.is_cancelled()
        || !shared
            .queue
            .transition(item_id, UploadStatus::Pending, UploadStatus::Uploading)
    {
        mark_cancelled(&shared.queue, item_id);
        return None;
    }
    tracing::debug!(item_id = %item_id, path = %storage_path, "Upload started");

    let grant = match shared.grants.grant(&storage_path).await {
        Ok(grant) => grant,
        Err(e) => {
            tracing::error!(error = %e, item_id = %item_id, "Failed to obtain upload grant");
            shared.queue.fail(item_id, e.to_string());
            return None;
        }
    };

    let content_type = if job.file.mime_type.is_empty() {
        content_type_for_path(&job.file.name).to_string()
    } else {
        job.file.mime_type.clone()
    };

    let queue = shared.queue.clone();
    let on_progress = Arc::new(move |fraction: f32| {
        let percent = (fraction.clamp(0.0, 1.0) * 100.0).round() as u8;
        queue.patch(item_id, |item| {
            item.progress_percent = item.progress_percent.max(percent);
        });
    });

    let outcome = shared
        .transport
        .transfer(
            &grant.url,
            job.file.bytes.clone(),
            &content_type,
            on_progress,
            job.cancel.clone(),
        )
        .await;

    match outcome {
        Ok(TransferOutcome::Completed) => {}
        Ok(TransferOutcome::Cancelled) => {
            mark_cancelled(&shared.queue, item_id);
            return None;
        }
        Err(e) => {
            tracing::warn!(error = %e, item_id = %item_id, "Upload failed");
            shared.queue.fail(item_id, e.to_string());
            return None;
        }
    }

    if let Err(e) = shared
        .records
        .mark_uploaded(variation_id, &storage_path)
        .await
    {
        tracing::error!(error = %e, item_id = %item_id, "Failed to record storage path");
        shared
            .queue
            .fail(item_id, format!("uploaded but could not update record: {}", e));
        return None;
    }

    shared.queue.retire(item_id, |item| {
        item.status = UploadStatus::Success;
        item.progress_percent = 100;
        item.storage_path = Some(storage_path.clone());
    });
    tracing::info!(item_id = %item_id, path = %storage_path, "Upload succeeded");

    let trigger_shared = shared.clone();
    let handle = tokio::spawn(async move {
        match trigger_shared.trigger.trigger(&storage_path).await {
            Ok(ack) if ack.is_partial() => {
                trigger_shared.warn(format!(
                    "derivatives for {} incomplete, failed widths {:?}",
                    storage_path, ack.failed_widths
                ));
            }
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, path = %storage_path, "Processing trigger failed");
                trigger_shared.warn(format!("processing not started for {}: {}", storage_path, e));
            }
        }
    });

    Some(handle)
}

fn mark_cancelled(queue: &Queue, item_id: Uuid) {
    tracing::info!(item_id = %item_id, "Upload cancelled");
    queue.patch(item_id, |item| {
        item.status = UploadStatus::Cancelled;
    });
}

/// Caller's handle on a running batch.
pub struct BatchHandle {
    version_id: Uuid,
    order: Vec<Uuid>,
    queue: Queue,
    cancels: Arc<HashMap<Uuid, CancellationToken>>,
    warnings: Arc<Mutex<Vec<String>>>,
    task: JoinHandle<Vec<JoinHandle<()>>>,
}

impl BatchHandle {
    pub fn version_id(&self) -> Uuid {
        self.version_id
    }

    /// Current visible queue.
    pub fn snapshot(&self) -> Vec<UploadItem> {
        self.queue.visible.borrow().clone()
    }

    /// Receiver that is notified on every queue change.
    pub fn subscribe(&self) -> watch::Receiver<Vec<UploadItem>> {
        self.queue.visible.subscribe()
    }

    /// Cancel a pending or in-flight item. Returns false for unknown or finished items.
    ///
    /// A queued item turns `Cancelled` at once; an in-flight one once its transfer aborts.
    pub fn cancel(&self, item_id: Uuid) -> bool {
        let active = self
            .queue
            .get(item_id)
            .is_some_and(|item| !item.status.is_terminal());
        match self.cancels.get(&item_id) {
            Some(token) if active => {
                token.cancel();
                if self.queue.transition(item_id, UploadStatus::Pending, UploadStatus::Cancelled) {
                    tracing::info!(item_id = %item_id, "Queued upload cancelled");
                }
                true
            }
            _ => false,
        }
    }

    /// Remove a failed or cancelled item from the visible queue.
    pub fn dismiss(&self, item_id: Uuid) -> bool {
        let dismissable = self.queue.get(item_id).is_some_and(|item| {
            matches!(item.status, UploadStatus::Error | UploadStatus::Cancelled)
        });
        if dismissable {
            self.queue.retire(item_id, |_| {});
        }
        dismissable
    }

    pub fn warnings(&self) -> Vec<String> {
        self.warnings
            .lock()
            .map(|warnings| warnings.clone())
            .unwrap_or_default()
    }

    /// Wait for every item to reach a terminal state and for the fired triggers to return.
    pub async fn wait(self) -> Result<BatchReport, UploadError> {
        let BatchHandle {
            version_id,
            order,
            queue,
            warnings,
            task,
            ..
        } = self;

        let triggers = task
            .await
            .map_err(|e| UploadError::Internal(e.to_string()))?;
        for trigger in triggers {
            if let Err(e) = trigger.await {
                tracing::warn!(error = %e, "Processing trigger task failed");
            }
        }

        let items = order
            .iter()
            .filter_map(|id| queue.find(*id))
            .map(|item| ItemOutcome::from_item(&item))
            .collect();
        let warnings = warnings
            .lock()
            .map(|warnings| warnings.clone())
            .unwrap_or_default();
        Ok(BatchReport {
            version_id,
            items,
            warnings,
        })
    }
}
