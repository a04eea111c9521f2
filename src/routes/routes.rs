//! Defines routes for the upload service.
//!
//! ## Structure
//! - **Uploads** (bearer token required)
//!   - `POST /api/thumbnail_upload/{videoID}` — multipart field `thumbnail`, 10 MiB cap
//!   - `POST /api/video_upload/{videoID}` — multipart field `video`, 1 GiB cap
//!
//! - **Reads**
//!   - `GET /api/videos/{videoID}` — fetch a video record
//!   - `GET /assets/{*path}` — locally stored thumbnails
//!
//! - **Probes**
//!   - `GET /healthz`, `GET /readyz`

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        upload_handlers::{
            THUMBNAIL_UPLOAD_LIMIT, VIDEO_UPLOAD_LIMIT, upload_thumbnail, upload_video,
        },
        video_handlers::{get_asset, get_video},
    },
    state::AppState,
};
use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

/// Build the router. The returned `Router<AppState>` still needs `.with_state`.
pub fn routes() -> Router<AppState> {
    Router::new()
        // health endpoints (mounted at root)
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route(
            "/api/thumbnail_upload/{video_id}",
            post(upload_thumbnail).layer(DefaultBodyLimit::max(THUMBNAIL_UPLOAD_LIMIT)),
        )
        .route(
            "/api/video_upload/{video_id}",
            post(upload_video).layer(DefaultBodyLimit::max(VIDEO_UPLOAD_LIMIT)),
        )
        .route("/api/videos/{video_id}", get(get_video))
        .route("/assets/{*path}", get(get_asset))
}
