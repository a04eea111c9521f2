mod helpers;

use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use bytes::Bytes;
use helpers::{TEST_PORT, bearer, dir_entries, setup_test_app, untyped_file_form};
use tubely::models::video::Video;
use uuid::Uuid;

const PNG_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nnot really an image";

fn thumbnail_form(mime: &str) -> MultipartForm {
    let part = Part::bytes(Bytes::from_static(PNG_BYTES))
        .file_name("thumb.png")
        .mime_type(mime);
    MultipartForm::new().add_part("thumbnail", part)
}

#[tokio::test]
async fn owner_can_upload_thumbnail() {
    let app = setup_test_app();
    let owner = Uuid::new_v4();
    let video = app.seed_video(owner).await;

    let response = app
        .server
        .post(&format!("/api/thumbnail_upload/{}", video.id))
        .add_header("Authorization", bearer(owner))
        .multipart(thumbnail_form("image/png"))
        .await;

    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Video = response.json();
    let url = body.thumbnail_url.clone().expect("thumbnail url set");
    let prefix = format!("http://localhost:{}/assets/", TEST_PORT);
    assert!(url.starts_with(&prefix), "unexpected url {url}");
    assert!(url.ends_with(".png"));
    assert!(body.updated_at > video.updated_at);

    // persisted, and the bytes landed in the assets root
    let stored = app.load_video(video.id).await;
    assert_eq!(stored.thumbnail_url.as_deref(), Some(url.as_str()));
    let file_name = url.trim_start_matches(&prefix);
    assert_eq!(dir_entries(app.assets_dir.path()), vec![file_name.to_string()]);
    assert_eq!(
        std::fs::read(app.assets_dir.path().join(file_name)).unwrap(),
        PNG_BYTES
    );

    // and is served back under /assets
    let served = app.server.get(&format!("/assets/{}", file_name)).await;
    assert_eq!(served.status_code(), StatusCode::OK);
    assert_eq!(served.header("content-type"), "image/png");
    assert_eq!(served.as_bytes().as_ref(), PNG_BYTES);
}

#[tokio::test]
async fn non_owner_is_unauthorized_and_record_unchanged() {
    let app = setup_test_app();
    let owner = Uuid::new_v4();
    let video = app.seed_video(owner).await;

    let response = app
        .server
        .post(&format!("/api/thumbnail_upload/{}", video.id))
        .add_header("Authorization", bearer(Uuid::new_v4()))
        .multipart(thumbnail_form("image/png"))
        .await;

    assert_eq!(response.status_code(), StatusCode::UNAUTHORIZED);
    let stored = app.load_video(video.id).await;
    assert!(stored.thumbnail_url.is_none());
    assert_eq!(stored.updated_at, video.updated_at);
}

#[tokio::test]
async fn missing_or_invalid_token_is_unauthorized() {
    let app = setup_test_app();
    let video = app.seed_video(Uuid::new_v4()).await;
    let path = format!("/api/thumbnail_upload/{}", video.id);

    let missing = app
        .server
        .post(&path)
        .multipart(thumbnail_form("image/png"))
        .await;
    assert_eq!(missing.status_code(), StatusCode::UNAUTHORIZED);

    let garbage = app
        .server
        .post(&path)
        .add_header("Authorization", "Bearer not-a-jwt")
        .multipart(thumbnail_form("image/png"))
        .await;
    assert_eq!(garbage.status_code(), StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = garbage.json();
    assert_eq!(body["status"], 401);
    assert_eq!(body["error"], "Couldn't validate JWT");

    assert!(dir_entries(app.assets_dir.path()).is_empty());
}

#[tokio::test]
async fn malformed_video_id_is_bad_request() {
    let app = setup_test_app();

    let response = app
        .server
        .post("/api/thumbnail_upload/not-a-uuid")
        .add_header("Authorization", bearer(Uuid::new_v4()))
        .multipart(thumbnail_form("image/png"))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "Invalid ID");
}

#[tokio::test]
async fn wrong_form_field_is_bad_request() {
    let app = setup_test_app();
    let owner = Uuid::new_v4();
    let video = app.seed_video(owner).await;

    let part = Part::bytes(Bytes::from_static(PNG_BYTES))
        .file_name("thumb.png")
        .mime_type("image/png");
    let response = app
        .server
        .post(&format!("/api/thumbnail_upload/{}", video.id))
        .add_header("Authorization", bearer(owner))
        .multipart(MultipartForm::new().add_part("image", part))
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert!(app.load_video(video.id).await.thumbnail_url.is_none());
}

#[tokio::test]
async fn unknown_video_is_an_internal_error() {
    let app = setup_test_app();

    let response = app
        .server
        .post(&format!("/api/thumbnail_upload/{}", Uuid::new_v4()))
        .add_header("Authorization", bearer(Uuid::new_v4()))
        .multipart(thumbnail_form("image/jpeg"))
        .await;

    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn asset_route_rejects_traversal_and_missing_files() {
    let app = setup_test_app();

    let missing = app.server.get("/assets/nope.png").await;
    assert_eq!(missing.status_code(), StatusCode::NOT_FOUND);

    let traversal = app.server.get("/assets/a..b.png").await;
    assert_eq!(traversal.status_code(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn thumbnail_without_content_type_is_rejected() {
    let app = setup_test_app();
    let owner = Uuid::new_v4();
    let video = app.seed_video(owner).await;
    let (content_type, body) = untyped_file_form("thumbnail", "thumb.png", PNG_BYTES);

    let response = app
        .server
        .post(&format!("/api/thumbnail_upload/{}", video.id))
        .add_header("Authorization", bearer(owner))
        .bytes(body)
        .content_type(&content_type)
        .await;

    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    assert!(response.text().contains("Missing Content-Type header"));
    assert!(dir_entries(app.assets_dir.path()).is_empty());
    assert!(app.load_video(video.id).await.thumbnail_url.is_none());
}
