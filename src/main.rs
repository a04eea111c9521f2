use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::{io::ErrorKind, str::FromStr, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;
use tubely::{
    config::AppConfig,
    services::{
        blob_store::{BlobStore, LocalBlobStore, S3BlobStore},
        media_service::FfmpegToolkit,
        video_repository::{SqliteVideoRepository, run_migrations},
    },
    state::AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = AppConfig::from_env_and_args()?;

    tracing::info!(
        host = %cfg.host,
        port = cfg.port,
        assets_root = %cfg.assets_root.display(),
        database_url = %cfg.database_url,
        s3_bucket = %cfg.s3_bucket,
        s3_region = %cfg.s3_region,
        "Starting tubely"
    );

    // --- Ensure assets directory exists ---
    cfg.ensure_assets_dir()
        .with_context(|| format!("creating assets dir {}", cfg.assets_root.display()))?;

    // --- Initialize SQLite connection ---
    let connect_options = SqliteConnectOptions::from_str(&cfg.database_url)
        .with_context(|| format!("parsing database url `{}`", cfg.database_url))?
        .create_if_missing(true);
    let db = Arc::new(
        SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?,
    );

    // --- Handle migration mode ---
    if migrate {
        run_migrations(&db).await?;
        tracing::info!("Database migration complete.");
        return Ok(()); // exit after migration
    }

    // --- Collaborators ---
    let blobs: Arc<dyn BlobStore> = match &cfg.object_store_dir {
        Some(dir) => {
            tracing::info!("Storing videos on local disk under {}", dir.display());
            Arc::new(LocalBlobStore::new(dir.clone(), cfg.s3_bucket.clone()))
        }
        None => Arc::new(S3BlobStore::new(cfg.s3_bucket.clone(), cfg.s3_region.clone()).await),
    };
    let videos = Arc::new(SqliteVideoRepository::new(db));
    let media = Arc::new(FfmpegToolkit::new(
        cfg.ffmpeg_path.clone(),
        cfg.ffprobe_path.clone(),
    ));

    let state = AppState::new(cfg, videos, blobs, media);
    let app = tubely::app(state.clone());

    // --- Start server ---
    let addr = state.config.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(state.config.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", state.config.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
