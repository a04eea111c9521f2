//! Test helpers: build an AppState with in-memory collaborators and a router
//! for integration tests.

#![allow(dead_code)]

use axum_test::TestServer;
use bytes::Bytes;
use chrono::{Duration, Utc};
use std::{path::Path, sync::Arc};
use tempfile::TempDir;
use tubely::{
    config::AppConfig,
    models::video::Video,
    services::{
        auth_service::make_jwt,
        blob_store::InMemoryBlobStore,
        media_service::StubToolkit,
        video_repository::{InMemoryVideoRepository, VideoRepository},
    },
    state::AppState,
};
use uuid::Uuid;

pub const TEST_JWT_SECRET: &str = "test-jwt-secret-at-least-32-characters";
pub const TEST_BUCKET: &str = "tubely-test";
pub const TEST_REGION: &str = "us-east-2";
pub const TEST_PORT: u16 = 8091;

/// Test application: server, collaborators and owned temp directories.
pub struct TestApp {
    pub server: TestServer,
    pub videos: InMemoryVideoRepository,
    pub blobs: InMemoryBlobStore,
    pub media: Arc<StubToolkit>,
    pub assets_dir: TempDir,
    pub tmp_dir: TempDir,
}

impl TestApp {
    /// Store a video owned by `owner` whose `updated_at` lies in the past.
    pub async fn seed_video(&self, owner: Uuid) -> Video {
        let mut video = Video::new(owner, "Boot camp", "An intro to boots");
        video.updated_at = Utc::now() - Duration::hours(1);
        self.videos.create_video(&video).await.unwrap();
        video
    }

    pub async fn load_video(&self, id: Uuid) -> Video {
        self.videos.get_video(id).await.unwrap().unwrap()
    }
}

pub fn token_for(user_id: Uuid) -> String {
    make_jwt(user_id, TEST_JWT_SECRET, Duration::hours(1)).unwrap()
}

pub fn bearer(user_id: Uuid) -> String {
    format!("Bearer {}", token_for(user_id))
}

pub fn test_config(assets_root: &Path, tmp_dir: &Path) -> AppConfig {
    AppConfig {
        host: "127.0.0.1".into(),
        port: TEST_PORT,
        assets_root: assets_root.to_path_buf(),
        database_url: "sqlite::memory:".into(),
        jwt_secret: TEST_JWT_SECRET.into(),
        s3_bucket: TEST_BUCKET.into(),
        s3_region: TEST_REGION.into(),
        object_store_dir: None,
        tmp_dir: tmp_dir.to_path_buf(),
        ffmpeg_path: "ffmpeg".into(),
        ffprobe_path: "ffprobe".into(),
    }
}

/// Setup a test app whose media stub reports the given toolkit behaviour.
pub fn setup_test_app_with(media: StubToolkit) -> TestApp {
    let assets_dir = tempfile::tempdir().expect("Failed to create assets dir");
    let tmp_dir = tempfile::tempdir().expect("Failed to create tmp dir");

    let videos = InMemoryVideoRepository::new();
    let blobs = InMemoryBlobStore::new(TEST_BUCKET);
    let media = Arc::new(media);

    let state = AppState::new(
        test_config(assets_dir.path(), tmp_dir.path()),
        Arc::new(videos.clone()),
        Arc::new(blobs.clone()),
        media.clone(),
    );
    let server = TestServer::new(tubely::app(state).into_make_service())
        .expect("Failed to create test server");

    TestApp {
        server,
        videos,
        blobs,
        media,
        assets_dir,
        tmp_dir,
    }
}

/// Setup a test app that probes every video as 1920x1080.
pub fn setup_test_app() -> TestApp {
    setup_test_app_with(StubToolkit::with_geometry(1920, 1080))
}

/// Names of the entries currently in `dir`.
pub fn dir_entries(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect()
}

const RAW_BOUNDARY: &str = "tubely-test-boundary";

/// A multipart body with a single file part that carries no `Content-Type`
/// header. Returns the request content type and the encoded body.
pub fn untyped_file_form(field: &str, file_name: &str, payload: &[u8]) -> (String, Bytes) {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{RAW_BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(payload);
    body.extend_from_slice(format!("\r\n--{RAW_BOUNDARY}--\r\n").as_bytes());
    (
        format!("multipart/form-data; boundary={RAW_BOUNDARY}"),
        Bytes::from(body),
    )
}
