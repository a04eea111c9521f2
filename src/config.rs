use anyhow::{Context, Result};
use clap::Parser;
use std::{
    env,
    path::{Path, PathBuf},
};

/// Centralized application configuration.
/// Combines environment variables and CLI arguments.
///
/// Built once at startup and shared read-only with every handler.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub assets_root: PathBuf,
    pub database_url: String,
    pub jwt_secret: String,
    pub s3_bucket: String,
    pub s3_region: String,
    pub object_store_dir: Option<PathBuf>,
    pub tmp_dir: PathBuf,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
}

/// Command-line + environment configuration.
#[derive(Parser, Debug)]
#[command(author, version, about = "Video thumbnail and upload API")]
pub struct Args {
    /// Host to bind to (overrides TUBELY_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides TUBELY_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory holding uploaded thumbnails (overrides TUBELY_ASSETS_ROOT)
    #[arg(long)]
    pub assets_root: Option<String>,

    /// Database URL (overrides TUBELY_DATABASE_URL)
    #[arg(long)]
    pub database_url: Option<String>,

    /// Secret used to verify bearer tokens (overrides TUBELY_JWT_SECRET)
    #[arg(long)]
    pub jwt_secret: Option<String>,

    /// Bucket receiving processed videos (overrides TUBELY_S3_BUCKET)
    #[arg(long)]
    pub s3_bucket: Option<String>,

    /// Region of the bucket (overrides TUBELY_S3_REGION)
    #[arg(long)]
    pub s3_region: Option<String>,

    /// Store videos on local disk under this directory instead of S3
    /// (overrides TUBELY_OBJECT_STORE_DIR)
    #[arg(long)]
    pub object_store_dir: Option<String>,

    /// Directory for in-flight video files (overrides TUBELY_TMP_DIR)
    #[arg(long)]
    pub tmp_dir: Option<String>,

    /// ffmpeg binary (overrides TUBELY_FFMPEG)
    #[arg(long)]
    pub ffmpeg: Option<String>,

    /// ffprobe binary (overrides TUBELY_FFPROBE)
    #[arg(long)]
    pub ffprobe: Option<String>,

    /// Run migrations and exit
    #[arg(long)]
    pub migrate: bool,
}

impl AppConfig {
    /// Parse environment variables + CLI args into AppConfig and migrate flag.
    pub fn from_env_and_args() -> Result<(Self, bool)> {
        let args = Args::parse();
        let migrate = args.migrate;
        Ok((Self::from_args(args)?, migrate))
    }

    /// Merge already-parsed CLI args over the environment.
    pub fn from_args(args: Args) -> Result<Self> {
        // --- Environment fallback ---
        let env_host = env::var("TUBELY_HOST").unwrap_or_else(|_| "0.0.0.0".into());
        let env_port = match env::var("TUBELY_PORT") {
            Ok(value) => value
                .parse::<u16>()
                .with_context(|| format!("parsing TUBELY_PORT value `{}`", value))?,
            Err(env::VarError::NotPresent) => 8091,
            Err(err) => return Err(err).context("reading TUBELY_PORT"),
        };
        let env_assets = env::var("TUBELY_ASSETS_ROOT").unwrap_or_else(|_| "./assets".into());
        let env_db =
            env::var("TUBELY_DATABASE_URL").unwrap_or_else(|_| "sqlite://./tubely.db".into());
        let env_region = env::var("TUBELY_S3_REGION").unwrap_or_else(|_| "us-east-1".into());
        let env_ffmpeg = env::var("TUBELY_FFMPEG").unwrap_or_else(|_| "ffmpeg".into());
        let env_ffprobe = env::var("TUBELY_FFPROBE").unwrap_or_else(|_| "ffprobe".into());

        let jwt_secret = match args.jwt_secret {
            Some(secret) => secret,
            None => env::var("TUBELY_JWT_SECRET").context("TUBELY_JWT_SECRET must be set")?,
        };
        let s3_bucket = match args.s3_bucket {
            Some(bucket) => bucket,
            None => env::var("TUBELY_S3_BUCKET").context("TUBELY_S3_BUCKET must be set")?,
        };

        // --- Merge ---
        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port: args.port.unwrap_or(env_port),
            assets_root: PathBuf::from(args.assets_root.unwrap_or(env_assets)),
            database_url: args.database_url.unwrap_or(env_db),
            jwt_secret,
            s3_bucket,
            s3_region: args.s3_region.unwrap_or(env_region),
            object_store_dir: args
                .object_store_dir
                .or_else(|| env::var("TUBELY_OBJECT_STORE_DIR").ok())
                .map(PathBuf::from),
            tmp_dir: args
                .tmp_dir
                .or_else(|| env::var("TUBELY_TMP_DIR").ok())
                .map(PathBuf::from)
                .unwrap_or_else(env::temp_dir),
            ffmpeg_path: args.ffmpeg.unwrap_or(env_ffmpeg),
            ffprobe_path: args.ffprobe.unwrap_or(env_ffprobe),
        })
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Create the assets root if it is missing.
    pub fn ensure_assets_dir(&self) -> std::io::Result<()> {
        if !self.assets_root.exists() {
            std::fs::create_dir_all(&self.assets_root)?;
            tracing::info!("Created assets directory at {}", self.assets_root.display());
        }
        Ok(())
    }

    /// Location on disk of a generated asset.
    pub fn asset_disk_path(&self, asset_path: impl AsRef<Path>) -> PathBuf {
        self.assets_root.join(asset_path)
    }

    /// Locally served URL of a generated asset.
    pub fn asset_url(&self, asset_path: &str) -> String {
        format!("http://localhost:{}/assets/{}", self.port, asset_path)
    }

    /// Public object-storage URL for `key`.
    pub fn object_url(&self, key: &str) -> String {
        format!(
            "https://{}.s3.{}.amazonaws.com/{}",
            self.s3_bucket, self.s3_region, key
        )
    }
}
