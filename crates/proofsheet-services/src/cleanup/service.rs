use super::{BucketCleanup, CleanupError, CleanupReport};
use proofsheet_core::{AppError, Config, OwnedPrefix, ParentKind};
use proofsheet_storage::{Storage, StorageError};
use std::sync::Arc;
use std::time::Instant;

/// Upper bound on list/delete rounds per bucket.
const MAX_ROUNDS: usize = 1000;

/// Removes every object under a deleted entity's prefix from each configured bucket.
///
/// Cleanup is best-effort: the owning row is already gone, so failures are logged and
/// reported but never turned into an error for the caller.
#[derive(Clone)]
pub struct CleanupService {
    storage: Arc<dyn Storage>,
    buckets: Vec<String>,
    list_limit: usize,
}

impl CleanupService {
    pub fn new(storage: Arc<dyn Storage>, buckets: Vec<String>, list_limit: usize) -> Self {
        Self {
            storage,
            buckets,
            list_limit: list_limit.max(1),
        }
    }

    /// Cleans the raw and processed buckets.
    pub fn from_config(storage: Arc<dyn Storage>, config: &Config) -> Self {
        Self::new(storage, config.buckets(), config.cleanup_list_limit())
    }

    pub fn buckets(&self) -> &[String] {
        &self.buckets
    }

    /// Resolve the prefix a deleted parent owned and clean it.
    pub async fn cleanup_parent(
        &self,
        kind: ParentKind,
        parent_id: &str,
        project_id: Option<&str>,
    ) -> Result<CleanupReport, AppError> {
        let prefix = OwnedPrefix::for_parent(kind, parent_id, project_id)?;
        Ok(self.cleanup(&prefix).await)
    }

    #[tracing::instrument(skip(self), fields(cleanup.prefix = %prefix))]
    pub async fn cleanup(&self, prefix: &OwnedPrefix) -> CleanupReport {
        let start = Instant::now();
        let mut buckets = Vec::with_capacity(self.buckets.len());

        for bucket in &self.buckets {
            buckets.push(self.cleanup_bucket(bucket, prefix).await);
        }

        let report = CleanupReport {
            prefix: prefix.to_string(),
            buckets,
        };

        if report.is_complete() {
            tracing::info!(
                prefix = %prefix,
                deleted = report.deleted(),
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Cleanup completed"
            );
        } else {
            tracing::warn!(
                prefix = %prefix,
                deleted = report.deleted(),
                failed = report.failed(),
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Cleanup completed with errors"
            );
        }

        report
    }

    async fn cleanup_bucket(&self, bucket: &str, prefix: &OwnedPrefix) -> BucketCleanup {
        let mut result = BucketCleanup {
            bucket: bucket.to_string(),
            ..BucketCleanup::default()
        };

        for _ in 0..MAX_ROUNDS {
            let page = match self
                .storage
                .list(bucket, prefix.as_list_prefix(), self.list_limit)
                .await
            {
                Ok(page) => page,
                Err(source) => {
                    let err = CleanupError::List {
                        bucket: bucket.to_string(),
                        prefix: prefix.to_string(),
                        source,
                    };
                    tracing::error!(error = %err, bucket = %bucket, "Cleanup listing failed");
                    result.errors.push(err.to_string());
                    break;
                }
            };

            let page_len = page.len();
            let paths: Vec<String> = page
                .into_iter()
                .map(|entry| entry.path)
                .filter(|path| prefix.contains(path))
                .collect();
            if paths.is_empty() {
                break;
            }

            let attempted = paths.len();
            let failed = match self.storage.delete(bucket, &paths).await {
                Ok(()) => 0,
                Err(StorageError::PartialDelete { failed, .. }) => failed.len(),
                Err(e) => {
                    tracing::error!(error = %e, bucket = %bucket, attempted, "Cleanup delete failed");
                    result.errors.push(e.to_string());
                    attempted
                }
            };
            result.deleted += attempted - failed;

            if failed > 0 {
                result.failed += failed;
                let err = CleanupError::Delete {
                    bucket: bucket.to_string(),
                    attempted,
                    failed,
                };
                tracing::error!(error = %err, bucket = %bucket, "Cleanup left objects behind");
                result.errors.push(err.to_string());
                // The survivors would be listed again on every round.
                break;
            }

            tracing::debug!(bucket = %bucket, deleted = attempted, "Cleanup page removed");

            if page_len < self.list_limit {
                break;
            }
        }

        result
    }
}
