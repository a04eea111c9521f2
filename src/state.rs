//! Shared state handed to every handler through axum's `State` extractor.

use crate::{
    config::AppConfig,
    services::{
        blob_store::BlobStore, media_service::MediaToolkit, video_repository::VideoRepository,
    },
};
use std::sync::Arc;

/// Immutable configuration plus the external collaborators.
///
/// Cloning is cheap: every field is reference counted.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub videos: Arc<dyn VideoRepository>,
    pub blobs: Arc<dyn BlobStore>,
    pub media: Arc<dyn MediaToolkit>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        videos: Arc<dyn VideoRepository>,
        blobs: Arc<dyn BlobStore>,
        media: Arc<dyn MediaToolkit>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            videos,
            blobs,
            media,
        }
    }
}
