//! Test helpers: build AppState and router over in-memory storage.
#![allow(dead_code)]

use async_trait::async_trait;
use axum_test::TestServer;
use bytes::Bytes;
use image::{ImageFormat, Rgba, RgbaImage};
use proofsheet_api::setup::routes;
use proofsheet_api::AppState;
use proofsheet_core::{Config, ProcessingTrigger, ServiceConfig, StorageBackend, TriggerAck, TriggerError};
use proofsheet_storage::{create_storage, Storage};
use std::io::Cursor;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const RAW: &str = "design-uploads";
pub const PROCESSED: &str = "design-uploads-processed";

/// Test application: server plus a handle on the storage behind it.
pub struct TestApp {
    pub server: TestServer,
    pub storage: Arc<dyn Storage>,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }

    pub async fn put_raw(&self, path: &str, bytes: Bytes) {
        self.storage
            .upload(RAW, path, bytes, "application/octet-stream", true)
            .await
            .unwrap();
    }

    pub async fn put(&self, bucket: &str, path: &str) {
        self.storage
            .upload(bucket, path, Bytes::from_static(b"x"), "image/webp", true)
            .await
            .unwrap();
    }

    pub async fn exists(&self, bucket: &str, path: &str) -> bool {
        self.storage.exists(bucket, path).await.unwrap()
    }

    /// Poll until `path` shows up in `bucket` or two seconds pass.
    pub async fn wait_for_object(&self, bucket: &str, path: &str) -> bool {
        for _ in 0..100 {
            if self.exists(bucket, path).await {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        false
    }
}

pub fn config_with(tweak: impl FnOnce(&mut ServiceConfig)) -> Config {
    let mut service = ServiceConfig {
        storage_backend: StorageBackend::Memory,
        ..ServiceConfig::default()
    };
    tweak(&mut service);
    Config(Box::new(service))
}

pub async fn setup_test_app() -> TestApp {
    setup_test_app_with(Config::in_memory(), None).await
}

pub async fn setup_test_app_with(
    config: Config,
    forwarder: Option<Arc<dyn ProcessingTrigger>>,
) -> TestApp {
    let storage = create_storage(&config).await.unwrap();
    let mut state = AppState::new(config.clone(), storage.clone()).unwrap();
    if let Some(forwarder) = forwarder {
        state = state.with_forwarder(forwarder);
    }
    let app = routes::setup_routes(&config, Arc::new(state)).unwrap();
    let server = TestServer::new(app.into_make_service()).expect("Failed to create test server");
    TestApp { server, storage }
}

pub fn png(width: u32, height: u32) -> Bytes {
    let img = RgbaImage::from_pixel(width, height, Rgba([0, 128, 255, 255]));
    let mut buffer = Vec::new();
    img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
        .unwrap();
    Bytes::from(buffer)
}

/// Forwarder that records the paths it was asked to process.
#[derive(Default)]
pub struct RecordingForwarder {
    pub paths: Mutex<Vec<String>>,
}

impl RecordingForwarder {
    pub fn paths(&self) -> Vec<String> {
        self.paths.lock().unwrap().clone()
    }

    pub async fn wait_for_calls(&self, count: usize) -> Vec<String> {
        for _ in 0..100 {
            if self.paths.lock().unwrap().len() >= count {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.paths()
    }
}

#[async_trait]
impl ProcessingTrigger for RecordingForwarder {
    async fn trigger(&self, original_path: &str) -> Result<TriggerAck, TriggerError> {
        self.paths.lock().unwrap().push(original_path.to_string());
        Ok(TriggerAck::complete())
    }
}
