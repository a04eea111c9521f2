//! External media tooling: `ffprobe` for stream geometry and `ffmpeg` for
//! fast-start remuxing.
//!
//! Handlers only see the [`MediaToolkit`] trait. [`FfmpegToolkit`] shells out
//! to the real binaries; [`StubToolkit`] fakes both tools so the upload flow
//! can be exercised without a media toolchain installed.

use crate::models::aspect_ratio::AspectRatio;
use async_trait::async_trait;
use serde::Deserialize;
use std::{
    ffi::OsString,
    io,
    path::{Path, PathBuf},
    sync::atomic::{AtomicUsize, Ordering},
};
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, error, info};

/// Suffix appended to the input path for the remuxed output.
pub const PROCESSING_SUFFIX: &str = ".processing";

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("failed to run {tool}: {source}")]
    Spawn {
        tool: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("{tool} exited with {status}\nstdout: {stdout}\nstderr: {stderr}")]
    ToolFailed {
        tool: &'static str,
        status: String,
        stdout: String,
        stderr: String,
    },
    #[error("unexpected probe output: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("video stream has unusable geometry {width:?}x{height:?}")]
    InvalidGeometry {
        width: Option<u32>,
        height: Option<u32>,
    },
    #[error("no video stream found")]
    NoVideoStream,
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type MediaResult<T> = Result<T, MediaError>;

/// Probe and remux operations the video upload pipeline depends on.
#[async_trait]
pub trait MediaToolkit: Send + Sync {
    /// Classify the first video stream of the file at `path`.
    async fn aspect_ratio(&self, path: &Path) -> MediaResult<AspectRatio>;

    /// Copy the streams of `path` into `<path>.processing` with the moov atom
    /// moved to the front. Returns the output path; the caller deletes it.
    async fn process_for_fast_start(&self, path: &Path) -> MediaResult<PathBuf>;
}

/// `<input>.processing`
pub fn processing_path(input: &Path) -> PathBuf {
    let mut out = OsString::from(input.as_os_str());
    out.push(PROCESSING_SUFFIX);
    PathBuf::from(out)
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
}

/// Classify `ffprobe -print_format json -show_streams` output.
pub fn aspect_ratio_from_probe(stdout: &[u8]) -> MediaResult<AspectRatio> {
    let probe: ProbeOutput = serde_json::from_slice(stdout)?;
    let stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type.as_deref() == Some("video"))
        .ok_or(MediaError::NoVideoStream)?;

    match (stream.width, stream.height) {
        (Some(width), Some(height)) if width > 0 && height > 0 => {
            Ok(AspectRatio::classify(width, height))
        }
        (width, height) => Err(MediaError::InvalidGeometry { width, height }),
    }
}

/// Runs the real `ffprobe` and `ffmpeg` binaries.
#[derive(Debug, Clone)]
pub struct FfmpegToolkit {
    ffmpeg_path: String,
    ffprobe_path: String,
}

impl FfmpegToolkit {
    pub fn new(ffmpeg_path: impl Into<String>, ffprobe_path: impl Into<String>) -> Self {
        Self {
            ffmpeg_path: ffmpeg_path.into(),
            ffprobe_path: ffprobe_path.into(),
        }
    }
}

impl Default for FfmpegToolkit {
    fn default() -> Self {
        Self::new("ffmpeg", "ffprobe")
    }
}

#[async_trait]
impl MediaToolkit for FfmpegToolkit {
    #[tracing::instrument(skip(self), fields(tool = "ffprobe"))]
    async fn aspect_ratio(&self, path: &Path) -> MediaResult<AspectRatio> {
        let output = Command::new(&self.ffprobe_path)
            .args(["-v", "error", "-print_format", "json", "-show_streams"])
            .arg(path)
            .output()
            .await
            .map_err(|source| MediaError::Spawn {
                tool: "ffprobe",
                source,
            })?;

        if !output.status.success() {
            let err = MediaError::ToolFailed {
                tool: "ffprobe",
                status: output.status.to_string(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            };
            error!(error = %err, "ffprobe failed");
            return Err(err);
        }

        let ratio = aspect_ratio_from_probe(&output.stdout)?;
        debug!(%ratio, "probe completed");
        Ok(ratio)
    }

    #[tracing::instrument(skip(self), fields(tool = "ffmpeg"))]
    async fn process_for_fast_start(&self, path: &Path) -> MediaResult<PathBuf> {
        let output_path = processing_path(path);
        let start = std::time::Instant::now();

        let output = Command::new(&self.ffmpeg_path)
            .arg("-i")
            .arg(path)
            .args(["-c", "copy", "-movflags", "faststart", "-f", "mp4"])
            .arg(&output_path)
            .output()
            .await
            .map_err(|source| MediaError::Spawn {
                tool: "ffmpeg",
                source,
            })?;

        if !output.status.success() {
            let err = MediaError::ToolFailed {
                tool: "ffmpeg",
                status: output.status.to_string(),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            };
            error!(error = %err, "ffmpeg fast-start processing failed");
            // ffmpeg may leave a partial output behind
            let _ = tokio::fs::remove_file(&output_path).await;
            return Err(err);
        }

        info!(
            output = %output_path.display(),
            duration_ms = start.elapsed().as_millis(),
            "fast-start processing completed"
        );
        Ok(output_path)
    }
}

/// Deterministic stand-in for the media tools.
///
/// `process_for_fast_start` copies the input to `<input>.processing`;
/// `aspect_ratio` classifies the configured geometry, or reports no video
/// stream when none is configured. Invocations are counted.
#[derive(Debug, Default)]
pub struct StubToolkit {
    geometry: Option<(u32, u32)>,
    fail_processing: bool,
    probe_calls: AtomicUsize,
    process_calls: AtomicUsize,
}

impl StubToolkit {
    pub fn with_geometry(width: u32, height: u32) -> Self {
        Self {
            geometry: Some((width, height)),
            ..Self::default()
        }
    }

    /// A toolkit whose probe finds no video stream.
    pub fn without_video_stream() -> Self {
        Self::default()
    }

    /// Make `process_for_fast_start` fail as if ffmpeg exited non-zero.
    pub fn failing_processing(mut self) -> Self {
        self.fail_processing = true;
        self
    }

    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    pub fn process_calls(&self) -> usize {
        self.process_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MediaToolkit for StubToolkit {
    async fn aspect_ratio(&self, _path: &Path) -> MediaResult<AspectRatio> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        let (width, height) = self.geometry.ok_or(MediaError::NoVideoStream)?;
        Ok(AspectRatio::classify(width, height))
    }

    async fn process_for_fast_start(&self, path: &Path) -> MediaResult<PathBuf> {
        self.process_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_processing {
            return Err(MediaError::ToolFailed {
                tool: "ffmpeg",
                status: "exit status: 1".into(),
                stdout: String::new(),
                stderr: "stub failure".into(),
            });
        }
        let output_path = processing_path(path);
        tokio::fs::copy(path, &output_path).await?;
        Ok(output_path)
    }
}

/// Removes the file at its path when dropped.
///
/// Used for intermediate outputs produced by external tools, which are not
/// covered by a `tempfile` handle.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

impl ScratchFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("removed scratch file {}", self.path.display()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => debug!(
                "failed to remove scratch file {}: {}",
                self.path.display(),
                err
            ),
        }
    }
}
