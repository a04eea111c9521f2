//! Video thumbnail and upload API.
//!
//! Accepts thumbnail and video uploads for existing video records, normalizes
//! videos with `ffmpeg`, classifies them with `ffprobe`, stores thumbnails on
//! local disk and videos in object storage, and records the resulting URLs.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;

use axum::Router;
use state::AppState;

/// The complete application with its state attached.
pub fn app(state: AppState) -> Router {
    routes::routes::routes().with_state(state)
}
