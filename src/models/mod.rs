//! Core data models for the video upload service.
//!
//! `Video` maps to the `videos` table via `sqlx::FromRow` and is returned to
//! clients as JSON via `serde`.

pub mod aspect_ratio;
pub mod video;
