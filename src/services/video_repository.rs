//! Persistence for video records.
//!
//! [`SqliteVideoRepository`] is the production store; [`InMemoryVideoRepository`]
//! backs tests. Updates are last-writer-wins: no version check is made.

use crate::models::video::Video;
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::{collections::HashMap, sync::Arc};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

const MIGRATION_SQL: &str = include_str!("../../migrations/0001_init.sql");

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("video `{0}` not found")]
    VideoNotFound(Uuid),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

pub type RepositoryResult<T> = Result<T, RepositoryError>;

#[async_trait]
pub trait VideoRepository: Send + Sync {
    /// Look up a record; `Ok(None)` when no such video exists.
    async fn get_video(&self, id: Uuid) -> RepositoryResult<Option<Video>>;

    /// Overwrite the mutable columns of an existing record.
    async fn update_video(&self, video: &Video) -> RepositoryResult<()>;

    async fn create_video(&self, video: &Video) -> RepositoryResult<()>;

    /// Cheap connectivity check for readiness probes.
    async fn ping(&self) -> RepositoryResult<()>;
}

#[derive(Clone)]
pub struct SqliteVideoRepository {
    db: Arc<SqlitePool>,
}

impl SqliteVideoRepository {
    pub fn new(db: Arc<SqlitePool>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl VideoRepository for SqliteVideoRepository {
    async fn get_video(&self, id: Uuid) -> RepositoryResult<Option<Video>> {
        let video = sqlx::query_as::<_, Video>(
            "SELECT id, created_at, updated_at, title, description,
                    thumbnail_url, video_url, user_id
             FROM videos WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&*self.db)
        .await?;
        Ok(video)
    }

    async fn update_video(&self, video: &Video) -> RepositoryResult<()> {
        let result = sqlx::query(
            "UPDATE videos
             SET title = ?, description = ?, thumbnail_url = ?, video_url = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&video.title)
        .bind(&video.description)
        .bind(&video.thumbnail_url)
        .bind(&video.video_url)
        .bind(video.updated_at)
        .bind(video.id)
        .execute(&*self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::VideoNotFound(video.id));
        }
        Ok(())
    }

    async fn create_video(&self, video: &Video) -> RepositoryResult<()> {
        sqlx::query(
            "INSERT INTO videos (id, created_at, updated_at, title, description,
                                 thumbnail_url, video_url, user_id)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(video.id)
        .bind(video.created_at)
        .bind(video.updated_at)
        .bind(&video.title)
        .bind(&video.description)
        .bind(&video.thumbnail_url)
        .bind(&video.video_url)
        .bind(video.user_id)
        .execute(&*self.db)
        .await?;
        Ok(())
    }

    async fn ping(&self) -> RepositoryResult<()> {
        sqlx::query_scalar::<_, i64>("SELECT 1")
            .fetch_one(&*self.db)
            .await?;
        Ok(())
    }
}

/// Run the embedded schema migration statement by statement.
pub async fn run_migrations(db: &SqlitePool) -> RepositoryResult<()> {
    let statements = MIGRATION_SQL
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    tracing::info!("Running {} migration statements...", statements.len());

    for stmt in statements {
        debug!("Executing migration SQL: {}", stmt);
        sqlx::query(stmt).execute(db).await?;
    }
    Ok(())
}

/// Map-backed repository for tests and local experiments.
#[derive(Clone, Default)]
pub struct InMemoryVideoRepository {
    videos: Arc<RwLock<HashMap<Uuid, Video>>>,
}

impl InMemoryVideoRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VideoRepository for InMemoryVideoRepository {
    async fn get_video(&self, id: Uuid) -> RepositoryResult<Option<Video>> {
        Ok(self.videos.read().await.get(&id).cloned())
    }

    async fn update_video(&self, video: &Video) -> RepositoryResult<()> {
        let mut videos = self.videos.write().await;
        match videos.get_mut(&video.id) {
            Some(existing) => {
                *existing = video.clone();
                Ok(())
            }
            None => Err(RepositoryError::VideoNotFound(video.id)),
        }
    }

    async fn create_video(&self, video: &Video) -> RepositoryResult<()> {
        self.videos.write().await.insert(video.id, video.clone());
        Ok(())
    }

    async fn ping(&self) -> RepositoryResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn sqlite_repo() -> SqliteVideoRepository {
        // a single connection keeps the in-memory database alive and shared
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        run_migrations(&pool).await.unwrap();
        SqliteVideoRepository::new(Arc::new(pool))
    }

    #[tokio::test]
    async fn sqlite_round_trips_updates() {
        let repo = sqlite_repo().await;
        repo.ping().await.unwrap();

        let mut video = Video::new(Uuid::new_v4(), "Boots", "boot review");
        repo.create_video(&video).await.unwrap();

        let loaded = repo.get_video(video.id).await.unwrap().unwrap();
        assert_eq!(loaded.user_id, video.user_id);
        assert!(loaded.thumbnail_url.is_none());

        video.thumbnail_url = Some("http://localhost:8091/assets/a.png".into());
        video.updated_at = Utc::now();
        repo.update_video(&video).await.unwrap();

        let loaded = repo.get_video(video.id).await.unwrap().unwrap();
        assert_eq!(
            loaded.thumbnail_url.as_deref(),
            Some("http://localhost:8091/assets/a.png")
        );
        assert_eq!(loaded.updated_at, video.updated_at);
    }

    #[tokio::test]
    async fn sqlite_missing_video_is_none() {
        let repo = sqlite_repo().await;
        assert!(repo.get_video(Uuid::new_v4()).await.unwrap().is_none());

        let ghost = Video::new(Uuid::new_v4(), "ghost", "");
        assert!(matches!(
            repo.update_video(&ghost).await,
            Err(RepositoryError::VideoNotFound(id)) if id == ghost.id
        ));
    }

    #[tokio::test]
    async fn in_memory_update_requires_existing_record() {
        let repo = InMemoryVideoRepository::new();
        let mut video = Video::new(Uuid::new_v4(), "t", "d");
        assert!(repo.update_video(&video).await.is_err());

        repo.create_video(&video).await.unwrap();
        video.video_url = Some("https://b.s3.r.amazonaws.com/other/x.mp4".into());
        repo.update_video(&video).await.unwrap();
        assert_eq!(repo.get_video(video.id).await.unwrap(), Some(video));
    }
}
