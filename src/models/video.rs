//! Represents a video record owned by a single user.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A video entry whose media URLs are filled in by the upload endpoints.
///
/// Only the owning user may attach a thumbnail or video file.
#[derive(Serialize, Deserialize, Clone, FromRow, Debug, PartialEq)]
pub struct Video {
    /// Unique identifier, taken from the request path on upload.
    pub id: Uuid,

    /// When the record was created.
    pub created_at: DateTime<Utc>,

    /// Bumped every time an upload replaces a media URL.
    pub updated_at: DateTime<Utc>,

    pub title: String,

    pub description: String,

    /// Locally served thumbnail address, once uploaded.
    pub thumbnail_url: Option<String>,

    /// Public object-storage address of the processed video, once uploaded.
    pub video_url: Option<String>,

    /// ID of the user that owns this video.
    pub user_id: Uuid,
}

impl Video {
    /// A fresh record with no media attached.
    pub fn new(user_id: Uuid, title: impl Into<String>, description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            created_at: now,
            updated_at: now,
            title: title.into(),
            description: description.into(),
            thumbnail_url: None,
            video_url: None,
            user_id,
        }
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }
}
