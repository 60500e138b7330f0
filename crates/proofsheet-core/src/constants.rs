//! Shared constants: record-store table names, webhook vocabulary, storage layout.

/// Record-store table holding one row per uploaded image.
pub const VARIATIONS_TABLE: &str = "variations";

/// Record-store table holding design versions (parents of variations).
pub const VERSIONS_TABLE: &str = "versions";

/// Deletion webhook table names that own storage prefixes.
pub const PROJECTS_TABLE: &str = "projects";
pub const DESIGNS_TABLE: &str = "designs";

/// Table name the storage provider reports for object inserts.
pub const STORAGE_OBJECTS_TABLE: &str = "objects";

/// Webhook event types.
pub const EVENT_INSERT: &str = "INSERT";
pub const EVENT_DELETE: &str = "DELETE";

/// Header carrying the shared webhook secret.
pub const WEBHOOK_SECRET_HEADER: &str = "x-webhook-secret";

/// Root segment of every object path written by the upload pipeline.
pub const PROJECTS_ROOT: &str = "projects";

/// Basename used when stripping a width suffix leaves nothing behind.
pub const FALLBACK_BASENAME: &str = "image";

pub const DEFAULT_RAW_BUCKET: &str = "design-uploads";
pub const DEFAULT_PROCESSED_BUCKET: &str = "design-uploads-processed";
