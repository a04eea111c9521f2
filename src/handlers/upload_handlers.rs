//! Thumbnail and video upload endpoints.
//!
//! Both handlers are strictly ordered pipelines: every step either succeeds or
//! ends the request with an error response, and the video record is written
//! only as the very last step. Nothing is retried.

use crate::{
    errors::AppError,
    models::video::Video,
    services::{
        assets::{asset_path, prefixed_asset_path},
        auth_service::{bearer_token, validate_jwt},
        media_service::ScratchFile,
    },
    state::AppState,
};
use axum::{
    Json,
    extract::{
        Multipart, Path, State,
        multipart::{Field, MultipartRejection},
    },
    http::HeaderMap,
};
use chrono::Utc;
use std::io::SeekFrom;
use tokio::{
    fs::{self, File},
    io::{AsyncSeekExt, AsyncWriteExt},
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Upper bound for a thumbnail request body.
pub const THUMBNAIL_UPLOAD_LIMIT: usize = 10 << 20;

/// Upper bound for a video request body.
pub const VIDEO_UPLOAD_LIMIT: usize = 1 << 30;

/// The only container accepted by the video endpoint.
const VIDEO_MEDIA_TYPE: &str = "video/mp4";

/// `POST /api/thumbnail_upload/{videoID}`
///
/// Stores the `thumbnail` form file under the assets root and points the
/// video's `thumbnail_url` at its locally served address.
pub async fn upload_thumbnail(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Video>, AppError> {
    let video_id = parse_video_id(&video_id)?;
    let user_id = authenticate(&headers, &state.config.jwt_secret)?;

    info!(%video_id, %user_id, "uploading thumbnail");

    let mut multipart = accept_form(multipart)?;
    let mut field = loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some("thumbnail") => break field,
            Ok(Some(_)) => continue,
            Ok(None) => {
                warn!(%video_id, "thumbnail form has no `thumbnail` field");
                return Err(AppError::bad_request("Unable to parse form file"));
            }
            Err(err) => {
                warn!(error = %err, "reading thumbnail form");
                return Err(AppError::new(err.status(), "Unable to parse form file"));
            }
        }
    };

    let media_type = match field.content_type() {
        Some(ct) if !ct.is_empty() => ct.to_string(),
        _ => {
            warn!(%video_id, "thumbnail part has no content type");
            return Err(AppError::bad_request("Missing Content-Type header"));
        }
    };

    let image_path = asset_path(&media_type);
    let disk_path = state.config.asset_disk_path(&image_path);
    let mut file = File::create(&disk_path).await.map_err(|err| {
        error!(error = %err, path = %disk_path.display(), "creating thumbnail file");
        AppError::internal("Unable to create file")
    })?;

    let size_bytes = match copy_field(&mut field, &mut file).await {
        Ok(size_bytes) => size_bytes,
        Err(err) => {
            drop(file);
            let _ = fs::remove_file(&disk_path).await;
            return Err(err);
        }
    };
    debug!(%video_id, path = %image_path, size_bytes, "thumbnail written");

    let mut video = match state.videos.get_video(video_id).await {
        Ok(Some(video)) => video,
        Ok(None) => {
            warn!(%video_id, "thumbnail upload for unknown video");
            return Err(AppError::internal("Unable to get video from database"));
        }
        Err(err) => {
            error!(error = %err, %video_id, "loading video");
            return Err(AppError::internal("Unable to get video from database"));
        }
    };

    if !video.is_owned_by(user_id) {
        warn!(%video_id, %user_id, owner = %video.user_id, "thumbnail upload by non-owner");
        return Err(AppError::unauthorized("Not authorized to update this video"));
    }

    video.thumbnail_url = Some(state.config.asset_url(&image_path));
    video.updated_at = Utc::now();

    state.videos.update_video(&video).await.map_err(|err| {
        error!(error = %err, %video_id, "updating video");
        AppError::internal("error updating video")
    })?;

    Ok(Json(video))
}

/// `POST /api/video_upload/{videoID}`
///
/// Remuxes the `video` form file for fast start, classifies its aspect ratio,
/// uploads it to object storage under `<ratio>/<random>.mp4` and points the
/// video's `video_url` at the public object URL.
pub async fn upload_video(
    State(state): State<AppState>,
    Path(video_id): Path<String>,
    headers: HeaderMap,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Video>, AppError> {
    let video_id = parse_video_id(&video_id)?;
    let user_id = authenticate(&headers, &state.config.jwt_secret)?;

    let mut video = match state.videos.get_video(video_id).await {
        Ok(Some(video)) => video,
        Ok(None) => {
            warn!(%video_id, "video upload for unknown video");
            return Err(AppError::unauthorized("Couldn't find video"));
        }
        Err(err) => {
            error!(error = %err, %video_id, "loading video");
            return Err(AppError::unauthorized("Couldn't find video"));
        }
    };

    if !video.is_owned_by(user_id) {
        warn!(%video_id, %user_id, owner = %video.user_id, "video upload by non-owner");
        return Err(AppError::unauthorized("User mismatch"));
    }

    info!(%video_id, %user_id, "uploading video");

    let mut multipart = accept_form(multipart)?;
    let mut field = loop {
        match multipart.next_field().await {
            Ok(Some(field)) if field.name() == Some("video") => break field,
            Ok(Some(_)) => continue,
            Ok(None) => {
                warn!(%video_id, "video form has no `video` field");
                return Err(AppError::bad_request("Unable to parse form file"));
            }
            Err(err) => {
                warn!(error = %err, "reading video form");
                return Err(AppError::new(err.status(), "Unable to parse form file"));
            }
        }
    };

    let media_type = field
        .content_type()
        .unwrap_or_default()
        .parse::<mime::Mime>()
        .map_err(|err| {
            warn!(error = %err, "parsing video content type");
            AppError::bad_request("Unable to validate video")
        })?;
    if media_type.essence_str() != VIDEO_MEDIA_TYPE {
        warn!(media_type = %media_type, "rejected video media type");
        return Err(AppError::bad_request("Invalid media type for a video"));
    }

    // Removed when dropped, on every exit path below.
    let temp_video = tempfile::Builder::new()
        .prefix("tubely-upload-")
        .suffix(".mp4")
        .tempfile_in(&state.config.tmp_dir)
        .map_err(|err| {
            error!(error = %err, "creating temporary video");
            AppError::internal("Unable to create temporary video")
        })?;

    let handle = temp_video.as_file().try_clone().map_err(|err| {
        error!(error = %err, "opening temporary video");
        AppError::internal("Unable to create temporary video")
    })?;
    let mut temp_file = File::from_std(handle);
    let received_bytes = copy_field(&mut field, &mut temp_file).await?;
    debug!(%video_id, received_bytes, "video received");

    temp_file.seek(SeekFrom::Start(0)).await.map_err(|err| {
        error!(error = %err, "rewinding temporary video");
        AppError::internal("Unable to reset file pointer")
    })?;
    drop(temp_file);

    let processed = state
        .media
        .process_for_fast_start(temp_video.path())
        .await
        .map(ScratchFile::new)
        .map_err(|err| {
            error!(error = %err, "preprocessing video");
            AppError::internal("error preprocessing video")
        })?;

    let ratio = state
        .media
        .aspect_ratio(processed.path())
        .await
        .map_err(|err| {
            error!(error = %err, "probing video");
            AppError::internal("Unable to calculate video ratio")
        })?;

    let video_key = prefixed_asset_path(ratio.as_str(), VIDEO_MEDIA_TYPE);
    let stored = state
        .blobs
        .put_object(&video_key, processed.path(), VIDEO_MEDIA_TYPE)
        .await
        .map_err(|err| {
            error!(error = %err, key = %video_key, "uploading video");
            AppError::internal("error uploading video")
        })?;

    info!(
        %video_id,
        bucket = %state.blobs.bucket(),
        key = %stored.key,
        size_bytes = stored.size_bytes,
        etag = stored.etag.as_deref().unwrap_or("-"),
        "video stored"
    );

    video.video_url = Some(state.config.object_url(&video_key));
    video.updated_at = Utc::now();

    state.videos.update_video(&video).await.map_err(|err| {
        error!(error = %err, %video_id, "updating video");
        AppError::internal("error updating video")
    })?;

    Ok(Json(video))
}

pub(crate) fn parse_video_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|err| {
        warn!(error = %err, id = %raw, "invalid video id");
        AppError::bad_request("Invalid ID")
    })
}

/// Resolve the user behind the request's bearer token.
fn authenticate(headers: &HeaderMap, secret: &str) -> Result<Uuid, AppError> {
    let token = bearer_token(headers).map_err(|err| {
        warn!(error = %err, "missing bearer token");
        AppError::unauthorized("Couldn't find JWT")
    })?;
    validate_jwt(token, secret).map_err(|err| {
        warn!(error = %err, "rejected bearer token");
        AppError::unauthorized("Couldn't validate JWT")
    })
}

fn accept_form(multipart: Result<Multipart, MultipartRejection>) -> Result<Multipart, AppError> {
    multipart.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "request is not a multipart form");
        AppError::new(rejection.status(), "Unable to parse form file")
    })
}

/// Stream a form file into `out`, returning the number of bytes written.
///
/// Read failures (including the body limit) keep their multipart status;
/// write failures are internal errors.
async fn copy_field(field: &mut Field<'_>, out: &mut File) -> Result<u64, AppError> {
    let mut written: u64 = 0;
    loop {
        let chunk = match field.chunk().await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(err) => {
                warn!(error = %err, "reading uploaded file");
                return Err(AppError::new(err.status(), "Unable to read uploaded file"));
            }
        };
        out.write_all(&chunk).await.map_err(|err| {
            error!(error = %err, "writing uploaded file");
            AppError::internal("error copying file")
        })?;
        written += chunk.len() as u64;
    }
    out.flush().await.map_err(|err| {
        error!(error = %err, "flushing uploaded file");
        AppError::internal("error copying file")
    })?;
    Ok(written)
}
