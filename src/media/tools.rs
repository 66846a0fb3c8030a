//! The `MediaTools` seam and its ffmpeg-backed implementation.

use super::metadata::AudioTags;
use super::probe::AudioProbe;
use super::{artwork, metadata, probe, transcode, waveform};
use async_trait::async_trait;
use std::future::Future;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;
use tracing::warn;

/// Errors from external media tool invocations.
#[derive(Debug, Error)]
pub enum MediaToolError {
    #[error("ffprobe failed: {0}")]
    ProbeFailed(String),

    #[error("ffmpeg transcode failed: {0}")]
    TranscodeFailed(String),

    #[error("waveform generation failed: {0}")]
    WaveformFailed(String),

    #[error("cover art processing failed: {0}")]
    ArtworkFailed(String),

    #[error("{tool} timed out after {seconds}s")]
    Timeout { tool: &'static str, seconds: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid output: {0}")]
    InvalidOutput(String),
}

/// External binaries and the optional per-invocation time limit.
/// Without a limit a tool invocation waits as long as the tool runs.
#[derive(Debug, Clone)]
pub struct MediaToolsConfig {
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
    pub audiowaveform_bin: String,
    pub timeout: Option<Duration>,
}

impl Default for MediaToolsConfig {
    fn default() -> Self {
        Self {
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: "ffprobe".to_string(),
            audiowaveform_bin: "audiowaveform".to_string(),
            timeout: None,
        }
    }
}

/// Media operations the processing pipeline depends on.
#[async_trait]
pub trait MediaTools: Send + Sync {
    /// Inspect a source file. A corrupt file reports `AudioProbe::Invalid`
    /// rather than an error.
    async fn probe(&self, path: &Path) -> Result<AudioProbe, MediaToolError>;

    /// Transcode to a 320 kbps MP3, carrying embedded tags over.
    async fn transcode_to_mp3(&self, input: &Path, output: &Path) -> Result<(), MediaToolError>;

    /// Render waveform peak data as JSON.
    async fn generate_peaks(&self, audio: &Path, output: &Path) -> Result<(), MediaToolError>;

    /// Read embedded title/artist/album tags.
    async fn read_tags(&self, path: &Path) -> Result<AudioTags, MediaToolError>;

    /// Extract embedded cover art as image bytes. `None` when the file
    /// carries no art.
    async fn extract_cover_art(&self, path: &Path) -> Result<Option<Vec<u8>>, MediaToolError>;

    /// Resize raw image bytes into square cover art written as JPEG.
    async fn resize_art(&self, image: &[u8], output: &Path) -> Result<(), MediaToolError>;

    /// Representative color of an image file as `#rrggbb`.
    async fn dominant_color(&self, image: &Path) -> Result<String, MediaToolError>;
}

/// Implementation shelling out to ffmpeg/ffprobe/audiowaveform.
pub struct FfmpegMediaTools {
    config: MediaToolsConfig,
}

impl FfmpegMediaTools {
    pub fn new(config: MediaToolsConfig) -> Self {
        Self { config }
    }

    async fn bounded<T, F>(&self, tool: &'static str, fut: F) -> Result<T, MediaToolError>
    where
        F: Future<Output = Result<T, MediaToolError>>,
    {
        match self.config.timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .map_err(|_| MediaToolError::Timeout {
                    tool,
                    seconds: limit.as_secs(),
                })?,
            None => fut.await,
        }
    }
}

#[async_trait]
impl MediaTools for FfmpegMediaTools {
    async fn probe(&self, path: &Path) -> Result<AudioProbe, MediaToolError> {
        self.bounded("ffprobe", probe::probe_audio(&self.config.ffprobe_bin, path))
            .await
    }

    async fn transcode_to_mp3(&self, input: &Path, output: &Path) -> Result<(), MediaToolError> {
        self.bounded(
            "ffmpeg",
            transcode::transcode_to_mp3(&self.config.ffmpeg_bin, input, output),
        )
        .await
    }

    async fn generate_peaks(&self, audio: &Path, output: &Path) -> Result<(), MediaToolError> {
        self.bounded(
            "audiowaveform",
            waveform::generate_peaks(&self.config.audiowaveform_bin, audio, output),
        )
        .await
    }

    async fn read_tags(&self, path: &Path) -> Result<AudioTags, MediaToolError> {
        self.bounded("ffprobe", metadata::read_tags(&self.config.ffprobe_bin, path))
            .await
    }

    async fn extract_cover_art(&self, path: &Path) -> Result<Option<Vec<u8>>, MediaToolError> {
        self.bounded(
            "ffmpeg",
            metadata::extract_cover_art(&self.config.ffmpeg_bin, path),
        )
        .await
    }

    async fn resize_art(&self, image: &[u8], output: &Path) -> Result<(), MediaToolError> {
        self.bounded(
            "ffmpeg",
            artwork::resize_art(&self.config.ffmpeg_bin, image, output),
        )
        .await
    }

    async fn dominant_color(&self, image: &Path) -> Result<String, MediaToolError> {
        self.bounded(
            "ffmpeg",
            artwork::dominant_color(&self.config.ffmpeg_bin, image),
        )
        .await
    }
}

/// Check whether a tool binary responds to `-version`.
pub async fn check_tool_available(bin: &str) -> bool {
    Command::new(bin)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .await
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Probe all configured binaries at startup and warn about missing ones.
/// The server still starts; uploads will fail at processing time instead.
pub async fn warn_missing_tools(config: &MediaToolsConfig) {
    for bin in [
        &config.ffmpeg_bin,
        &config.ffprobe_bin,
        &config.audiowaveform_bin,
    ] {
        if !check_tool_available(bin).await {
            warn!("Media tool '{}' not found in PATH, processing will fail", bin);
        }
    }
}
