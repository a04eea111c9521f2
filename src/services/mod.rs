//! Business logic and external collaborators used by the HTTP handlers.

pub mod assets;
pub mod auth_service;
pub mod blob_store;
pub mod media_service;
pub mod video_repository;
