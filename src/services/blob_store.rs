//! Object storage for processed videos.
//!
//! - [`S3BlobStore`] uploads to an S3 bucket through the AWS SDK.
//! - [`LocalBlobStore`] mimics a bucket on local disk, sharded beneath
//!   `base_path/{bucket}/{shard}/{shard}/{key}`, for development without AWS.
//! - [`InMemoryBlobStore`] keeps objects in a map for tests.

use async_trait::async_trait;
use aws_sdk_s3::{Client, config::Region, error::DisplayErrorContext, primitives::ByteStream};
use bytes::Bytes;
use futures::StreamExt;
use md5::Context;
use std::{
    collections::HashMap,
    io::{self, ErrorKind},
    path::{Path, PathBuf},
    sync::Arc,
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
    sync::RwLock,
};
use tokio_util::io::ReaderStream;
use tracing::{debug, error, info};
use uuid::Uuid;

const MAX_OBJECT_KEY_LEN: usize = 1024;

#[derive(Debug, Error)]
pub enum BlobStoreError {
    #[error("invalid object key `{0}`")]
    InvalidKey(String),
    #[error("upload of `{key}` failed: {reason}")]
    UploadFailed { key: String, reason: String },
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type BlobResult<T> = Result<T, BlobStoreError>;

/// Summary of a completed upload.
#[derive(Debug, Clone)]
pub struct StoredObject {
    pub key: String,
    pub size_bytes: u64,
    pub etag: Option<String>,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Name of the bucket objects are written to.
    fn bucket(&self) -> &str;

    /// Store the contents of the local file at `source` under `key`.
    async fn put_object(
        &self,
        key: &str,
        source: &Path,
        content_type: &str,
    ) -> BlobResult<StoredObject>;
}

/// Basic key validation to avoid trivial path traversal vectors.
fn ensure_key_safe(key: &str) -> BlobResult<()> {
    let invalid = key.is_empty()
        || key.len() > MAX_OBJECT_KEY_LEN
        || key.starts_with('/')
        || key.contains("..")
        || key
            .bytes()
            .any(|b| b.is_ascii_control() || b == b'\\' || b == b'\0');
    if invalid {
        return Err(BlobStoreError::InvalidKey(key.to_string()));
    }
    Ok(())
}

#[derive(Clone)]
pub struct S3BlobStore {
    client: Client,
    bucket: String,
}

impl S3BlobStore {
    /// Build a client from the default AWS credential chain for `region`.
    pub async fn new(bucket: impl Into<String>, region: impl Into<String>) -> Self {
        let shared = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(region.into()))
            .load()
            .await;
        Self {
            client: Client::new(&shared),
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put_object(
        &self,
        key: &str,
        source: &Path,
        content_type: &str,
    ) -> BlobResult<StoredObject> {
        ensure_key_safe(key)?;
        let start = std::time::Instant::now();
        let size_bytes = fs::metadata(source).await?.len();

        let body = ByteStream::from_path(source)
            .await
            .map_err(|err| BlobStoreError::UploadFailed {
                key: key.to_string(),
                reason: err.to_string(),
            })?;

        let output = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|err| {
                let reason = DisplayErrorContext(err).to_string();
                error!(
                    error = %reason,
                    bucket = %self.bucket,
                    key = %key,
                    size_bytes,
                    "S3 upload failed"
                );
                BlobStoreError::UploadFailed {
                    key: key.to_string(),
                    reason,
                }
            })?;

        info!(
            bucket = %self.bucket,
            key = %key,
            size_bytes,
            duration_ms = start.elapsed().as_millis(),
            "S3 upload successful"
        );

        Ok(StoredObject {
            key: key.to_string(),
            size_bytes,
            etag: output.e_tag().map(|e| e.trim_matches('"').to_string()),
        })
    }
}

/// Filesystem-backed bucket.
#[derive(Clone)]
pub struct LocalBlobStore {
    base_path: PathBuf,
    bucket: String,
}

impl LocalBlobStore {
    pub fn new(base_path: impl Into<PathBuf>, bucket: impl Into<String>) -> Self {
        Self {
            base_path: base_path.into(),
            bucket: bucket.into(),
        }
    }

    /// Generate two-level shard identifiers for an object key.
    ///
    /// Uses MD5(bucket/key) and returns the first two bytes as lowercase
    /// hexadecimal strings (00–ff). Reduces file count per directory.
    fn object_shards(&self, key: &str) -> (String, String) {
        let digest = md5::compute(format!("{}/{}", self.bucket, key));
        (format!("{:02x}", digest[0]), format!("{:02x}", digest[1]))
    }

    /// Where the payload for `key` lives. Parent directories may not exist yet.
    pub fn object_path(&self, key: &str) -> PathBuf {
        let (shard_a, shard_b) = self.object_shards(key);
        let mut path = self.base_path.join(&self.bucket);
        path.push(shard_a);
        path.push(shard_b);
        path.push(key);
        path
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Streams the source into a temporary file while computing its MD5, then
    /// fsyncs and renames it into place. The temporary file is removed on
    /// every error path.
    async fn put_object(
        &self,
        key: &str,
        source: &Path,
        content_type: &str,
    ) -> BlobResult<StoredObject> {
        ensure_key_safe(key)?;

        let file_path = self.object_path(key);
        let parent = file_path.parent().map(Path::to_path_buf).ok_or_else(|| {
            BlobStoreError::Io(io::Error::new(
                ErrorKind::Other,
                "object path missing parent directory",
            ))
        })?;
        fs::create_dir_all(&parent).await?;
        let tmp_path = parent.join(format!(".tmp-{}", Uuid::new_v4()));

        match write_with_digest(source, &tmp_path).await {
            Ok((size_bytes, etag)) => {
                if let Err(err) = fs::rename(&tmp_path, &file_path).await {
                    let _ = fs::remove_file(&tmp_path).await;
                    return Err(BlobStoreError::Io(err));
                }
                debug!(
                    bucket = %self.bucket,
                    key = %key,
                    content_type = %content_type,
                    size_bytes,
                    "stored object at {}",
                    file_path.display()
                );
                Ok(StoredObject {
                    key: key.to_string(),
                    size_bytes,
                    etag: Some(etag),
                })
            }
            Err(err) => {
                let _ = fs::remove_file(&tmp_path).await;
                Err(BlobStoreError::Io(err))
            }
        }
    }
}

/// Copy `source` to `dest`, returning the byte count and hex MD5.
async fn write_with_digest(source: &Path, dest: &Path) -> io::Result<(u64, String)> {
    let mut stream = ReaderStream::new(File::open(source).await?);
    let mut file = File::create(dest).await?;

    let mut size_bytes: u64 = 0;
    let mut digest = Context::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        size_bytes += chunk.len() as u64;
        digest.consume(&chunk);
        file.write_all(&chunk).await?;
    }
    file.flush().await?;
    file.sync_all().await?;

    Ok((size_bytes, format!("{:x}", digest.compute())))
}

/// An object held by [`InMemoryBlobStore`].
#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub bytes: Bytes,
    pub content_type: String,
}

#[derive(Clone)]
pub struct InMemoryBlobStore {
    bucket: String,
    objects: Arc<RwLock<HashMap<String, StoredBlob>>>,
}

impl InMemoryBlobStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            objects: Arc::default(),
        }
    }

    pub async fn get(&self, key: &str) -> Option<StoredBlob> {
        self.objects.read().await.get(key).cloned()
    }

    pub async fn keys(&self) -> Vec<String> {
        self.objects.read().await.keys().cloned().collect()
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put_object(
        &self,
        key: &str,
        source: &Path,
        content_type: &str,
    ) -> BlobResult<StoredObject> {
        ensure_key_safe(key)?;
        let bytes = Bytes::from(fs::read(source).await?);
        let size_bytes = bytes.len() as u64;
        self.objects.write().await.insert(
            key.to_string(),
            StoredBlob {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(StoredObject {
            key: key.to_string(),
            size_bytes,
            etag: None,
        })
    }
}
