//! Read-only endpoints: video records and locally stored assets.

use crate::{
    errors::AppError, handlers::upload_handlers::parse_video_id, models::video::Video,
    state::AppState,
};
use axum::{
    Json,
    body::Body,
    extract::{Path, State},
    http::{HeaderValue, StatusCode, header},
    response::Response,
};
use std::io;
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::error;

/// `GET /api/videos/{videoID}`
pub async fn get_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
) -> Result<Json<Video>, AppError> {
    let video_id = parse_video_id(&video_id)?;
    match state.videos.get_video(video_id).await {
        Ok(Some(video)) => Ok(Json(video)),
        Ok(None) => Err(AppError::not_found("Couldn't find video")),
        Err(err) => {
            error!(error = %err, %video_id, "loading video");
            Err(AppError::internal("Couldn't get video"))
        }
    }
}

/// `GET /assets/{*path}` — stream a file from the assets root.
pub async fn get_asset(
    State(state): State<AppState>,
    Path(path): Path<String>,
) -> Result<Response, AppError> {
    if path.is_empty() || path.starts_with('/') || path.contains("..") || path.contains('\\') {
        return Err(AppError::bad_request("Invalid asset path"));
    }

    let disk_path = state.config.asset_disk_path(&path);
    let file = File::open(&disk_path).await.map_err(|err| {
        if err.kind() == io::ErrorKind::NotFound {
            AppError::not_found("Asset not found")
        } else {
            error!(error = %err, path = %disk_path.display(), "opening asset");
            AppError::internal("Couldn't read asset")
        }
    })?;

    let mut response = Response::new(Body::from_stream(ReaderStream::new(file)));
    *response.status_mut() = StatusCode::OK;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static(content_type_for(&path)),
    );
    Ok(response)
}

/// Content type for an asset, derived from the extension it was saved with.
fn content_type_for(path: &str) -> &'static str {
    let ext = path.rsplit_once('.').map(|(_, ext)| ext).unwrap_or_default();
    match ext.to_ascii_lowercase().as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "svg+xml" | "svg" => "image/svg+xml",
        "mp4" => "video/mp4",
        _ => "application/octet-stream",
    }
}
