//! Configuration module
//!
//! Service configuration is read from the environment (with `.env` support). Every
//! variable has a default; malformed numbers fall back to it. `validate()` rejects
//! inconsistent combinations before anything starts.

use std::env;
use std::time::Duration;

use crate::constants::{DEFAULT_PROCESSED_BUCKET, DEFAULT_RAW_BUCKET};
use crate::formats::FormatPolicy;
use crate::models::{DerivativeFormat, DerivativeSpec};
use crate::paths::PathDeriver;
use crate::storage_types::StorageBackend;

const SERVER_PORT: u16 = 4000;
const DERIVATIVE_WIDTHS: &str = "200,800,1600";
const DERIVATIVE_QUALITY: u8 = 80;
const ALLOWED_EXTENSIONS: &str = "jpg,jpeg,png,webp,gif";
const PASSTHROUGH_EXTENSIONS: &str = "gif";
const MAX_FILE_SIZE_MB: u64 = 25;
const UPLOAD_CONCURRENCY: usize = 3;
const UPLOAD_GRANT_TTL_SECS: u64 = 7200;
const CLEANUP_LIST_LIMIT: usize = 1000;

/// Settings shared by every HTTP-facing service
#[derive(Clone, Debug)]
pub struct BaseConfig {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub environment: String,
}

/// Media pipeline configuration
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub base: BaseConfig,
    // Storage
    pub storage_backend: StorageBackend,
    pub s3_region: Option<String>,
    pub s3_endpoint: Option<String>, // S3-compatible providers (MinIO, Supabase S3 gateway)
    pub aws_region: Option<String>,
    pub local_storage_path: Option<String>,
    pub raw_bucket: String,
    pub processed_bucket: String,
    // Derivatives
    pub derivative_widths: Vec<u32>,
    pub derivative_format: DerivativeFormat,
    pub derivative_quality: u8,
    pub allowed_extensions: Vec<String>,
    pub passthrough_extensions: Vec<String>,
    // Uploads
    pub max_file_size_bytes: u64,
    pub upload_concurrency: usize,
    pub upload_grant_ttl_secs: u64,
    // Cleanup
    pub cleanup_list_limit: usize,
    // Webhooks
    pub process_image_url: Option<String>,
    pub webhook_secret: Option<String>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base: BaseConfig {
                server_port: SERVER_PORT,
                cors_origins: vec!["*".to_string()],
                environment: "development".to_string(),
            },
            storage_backend: StorageBackend::S3,
            s3_region: None,
            s3_endpoint: None,
            aws_region: None,
            local_storage_path: None,
            raw_bucket: DEFAULT_RAW_BUCKET.to_string(),
            processed_bucket: DEFAULT_PROCESSED_BUCKET.to_string(),
            derivative_widths: vec![200, 800, 1600],
            derivative_format: DerivativeFormat::WebP,
            derivative_quality: DERIVATIVE_QUALITY,
            allowed_extensions: split_list(ALLOWED_EXTENSIONS),
            passthrough_extensions: split_list(PASSTHROUGH_EXTENSIONS),
            max_file_size_bytes: MAX_FILE_SIZE_MB * 1024 * 1024,
            upload_concurrency: UPLOAD_CONCURRENCY,
            upload_grant_ttl_secs: UPLOAD_GRANT_TTL_SECS,
            cleanup_list_limit: CLEANUP_LIST_LIMIT,
            process_image_url: None,
            webhook_secret: None,
        }
    }
}

/// Application configuration.
#[derive(Clone, Debug)]
pub struct Config(pub Box<ServiceConfig>);

impl Config {
    fn as_service(&self) -> &ServiceConfig {
        &self.0
    }

    pub fn from_env() -> Result<Self, anyhow::Error> {
        let config = ServiceConfig::from_env()?;
        Ok(Config(Box::new(config)))
    }

    /// Defaults with the in-memory storage backend.
    pub fn in_memory() -> Self {
        Config(Box::new(ServiceConfig {
            storage_backend: StorageBackend::Memory,
            ..ServiceConfig::default()
        }))
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        self.as_service().validate()
    }

    /// Check if the application is running in production mode
    pub fn is_production(&self) -> bool {
        is_production_env(&self.as_service().base.environment)
    }

    pub fn server_port(&self) -> u16 {
        self.as_service().base.server_port
    }

    pub fn cors_origins(&self) -> &[String] {
        &self.as_service().base.cors_origins
    }

    pub fn environment(&self) -> &str {
        &self.as_service().base.environment
    }

    pub fn storage_backend(&self) -> StorageBackend {
        self.as_service().storage_backend
    }

    /// `S3_REGION`, falling back to `AWS_REGION`.
    pub fn s3_region(&self) -> Option<&str> {
        self.as_service()
            .s3_region
            .as_deref()
            .or(self.as_service().aws_region.as_deref())
    }

    pub fn s3_endpoint(&self) -> Option<&str> {
        self.as_service().s3_endpoint.as_deref()
    }

    pub fn local_storage_path(&self) -> Option<&str> {
        self.as_service().local_storage_path.as_deref()
    }

    pub fn raw_bucket(&self) -> &str {
        &self.as_service().raw_bucket
    }

    pub fn processed_bucket(&self) -> &str {
        &self.as_service().processed_bucket
    }

    /// Every bucket that may hold objects under an owned prefix.
    pub fn buckets(&self) -> Vec<String> {
        vec![
            self.as_service().raw_bucket.clone(),
            self.as_service().processed_bucket.clone(),
        ]
    }

    pub fn derivative_format(&self) -> DerivativeFormat {
        self.as_service().derivative_format
    }

    pub fn derivative_quality(&self) -> u8 {
        self.as_service().derivative_quality
    }

    /// Ordered derivative outputs.
    pub fn derivative_specs(&self) -> Vec<DerivativeSpec> {
        let format = self.as_service().derivative_format;
        self.as_service()
            .derivative_widths
            .iter()
            .map(|&w| DerivativeSpec::new(w, format))
            .collect()
    }

    pub fn path_deriver(&self) -> PathDeriver {
        PathDeriver::new(self.as_service().derivative_format.extension())
    }

    pub fn format_policy(&self) -> FormatPolicy {
        FormatPolicy::new(
            &self.as_service().allowed_extensions,
            &self.as_service().passthrough_extensions,
        )
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        self.as_service().max_file_size_bytes
    }

    pub fn upload_concurrency(&self) -> usize {
        self.as_service().upload_concurrency
    }

    pub fn upload_grant_ttl(&self) -> Duration {
        Duration::from_secs(self.as_service().upload_grant_ttl_secs)
    }

    pub fn cleanup_list_limit(&self) -> usize {
        self.as_service().cleanup_list_limit
    }

    pub fn process_image_url(&self) -> Option<&str> {
        self.as_service().process_image_url.as_deref()
    }

    pub fn webhook_secret(&self) -> Option<&str> {
        self.as_service().webhook_secret.as_deref()
    }
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, anyhow::Error> {
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .or_else(|_| env::var("APP_ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let cors_origins_str = env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string());
        if is_production_env(&environment) && cors_origins_str.trim() == "*" {
            return Err(anyhow::anyhow!(
                "CORS_ORIGINS cannot be '*' in production. Please specify explicit origins."
            ));
        }

        let base = BaseConfig {
            server_port: env::var("PORT")
                .unwrap_or_else(|_| SERVER_PORT.to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number"))?,
            cors_origins: cors_origins_str
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            environment,
        };

        let storage_backend = match env::var("STORAGE_BACKEND") {
            Ok(s) => s.parse()?,
            Err(_) => StorageBackend::S3,
        };

        let derivative_widths = env::var("DERIVATIVE_WIDTHS")
            .unwrap_or_else(|_| DERIVATIVE_WIDTHS.to_string())
            .split(',')
            .map(|s| s.trim())
            .filter(|s| !s.is_empty())
            .map(|s| {
                s.parse::<u32>()
                    .map_err(|_| anyhow::anyhow!("DERIVATIVE_WIDTHS contains an invalid width: {}", s))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let derivative_format = match env::var("DERIVATIVE_FORMAT") {
            Ok(s) => s.parse()?,
            Err(_) => DerivativeFormat::WebP,
        };

        let max_file_size_mb = env::var("MAX_FILE_SIZE_MB")
            .unwrap_or_else(|_| MAX_FILE_SIZE_MB.to_string())
            .parse::<u64>()
            .unwrap_or(MAX_FILE_SIZE_MB);

        Ok(ServiceConfig {
            base,
            storage_backend,
            s3_region: env::var("S3_REGION").ok(),
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            aws_region: env::var("AWS_REGION").ok(),
            local_storage_path: env::var("LOCAL_STORAGE_PATH").ok(),
            raw_bucket: env::var("RAW_BUCKET").unwrap_or_else(|_| DEFAULT_RAW_BUCKET.to_string()),
            processed_bucket: env::var("PROCESSED_BUCKET")
                .unwrap_or_else(|_| DEFAULT_PROCESSED_BUCKET.to_string()),
            derivative_widths,
            derivative_format,
            derivative_quality: env::var("DERIVATIVE_QUALITY")
                .unwrap_or_else(|_| DERIVATIVE_QUALITY.to_string())
                .parse()
                .unwrap_or(DERIVATIVE_QUALITY),
            allowed_extensions: split_list(
                &env::var("ALLOWED_EXTENSIONS").unwrap_or_else(|_| ALLOWED_EXTENSIONS.to_string()),
            ),
            passthrough_extensions: split_list(
                &env::var("PASSTHROUGH_EXTENSIONS")
                    .unwrap_or_else(|_| PASSTHROUGH_EXTENSIONS.to_string()),
            ),
            max_file_size_bytes: max_file_size_mb * 1024 * 1024,
            upload_concurrency: env::var("UPLOAD_CONCURRENCY")
                .unwrap_or_else(|_| UPLOAD_CONCURRENCY.to_string())
                .parse()
                .unwrap_or(UPLOAD_CONCURRENCY),
            upload_grant_ttl_secs: env::var("UPLOAD_GRANT_TTL_SECS")
                .unwrap_or_else(|_| UPLOAD_GRANT_TTL_SECS.to_string())
                .parse()
                .unwrap_or(UPLOAD_GRANT_TTL_SECS),
            cleanup_list_limit: env::var("CLEANUP_LIST_LIMIT")
                .unwrap_or_else(|_| CLEANUP_LIST_LIMIT.to_string())
                .parse()
                .unwrap_or(CLEANUP_LIST_LIMIT),
            process_image_url: env::var("PROCESS_IMAGE_URL").ok().filter(|s| !s.is_empty()),
            webhook_secret: env::var("WEBHOOK_SECRET").ok().filter(|s| !s.is_empty()),
        })
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.derivative_widths.is_empty() {
            return Err(anyhow::anyhow!(
                "DERIVATIVE_WIDTHS must contain at least one width"
            ));
        }
        if self.derivative_widths.contains(&0) {
            return Err(anyhow::anyhow!("DERIVATIVE_WIDTHS must be greater than 0"));
        }
        let mut seen = self.derivative_widths.clone();
        seen.sort_unstable();
        seen.dedup();
        if seen.len() != self.derivative_widths.len() {
            return Err(anyhow::anyhow!("DERIVATIVE_WIDTHS must not repeat a width"));
        }

        if !(1..=100).contains(&self.derivative_quality) {
            return Err(anyhow::anyhow!(
                "DERIVATIVE_QUALITY must be between 1 and 100"
            ));
        }

        if self.upload_concurrency == 0 {
            return Err(anyhow::anyhow!("UPLOAD_CONCURRENCY must be at least 1"));
        }

        if self.cleanup_list_limit == 0 {
            return Err(anyhow::anyhow!("CLEANUP_LIST_LIMIT must be at least 1"));
        }

        if let Some(ext) = self
            .passthrough_extensions
            .iter()
            .find(|ext| !self.allowed_extensions.contains(ext))
        {
            return Err(anyhow::anyhow!(
                "PASSTHROUGH_EXTENSIONS entry '{}' is not in ALLOWED_EXTENSIONS",
                ext
            ));
        }

        if self.raw_bucket.is_empty() || self.processed_bucket.is_empty() {
            return Err(anyhow::anyhow!(
                "RAW_BUCKET and PROCESSED_BUCKET must not be empty"
            ));
        }
        if self.raw_bucket == self.processed_bucket {
            return Err(anyhow::anyhow!(
                "RAW_BUCKET and PROCESSED_BUCKET must be different buckets"
            ));
        }

        match self.storage_backend {
            StorageBackend::S3 => {
                if self.s3_region.is_none() && self.aws_region.is_none() {
                    return Err(anyhow::anyhow!(
                        "S3_REGION or AWS_REGION must be set when using S3 storage backend"
                    ));
                }
            }
            StorageBackend::Local => {
                if self.local_storage_path.is_none() {
                    return Err(anyhow::anyhow!(
                        "LOCAL_STORAGE_PATH must be set when using local storage backend"
                    ));
                }
            }
            StorageBackend::Memory => {}
        }

        Ok(())
    }
}

fn is_production_env(environment: &str) -> bool {
    let environment = environment.to_lowercase();
    environment == "production" || environment == "prod"
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().trim_start_matches('.').to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}
