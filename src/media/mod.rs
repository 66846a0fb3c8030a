//! Media tool adapters around ffmpeg, ffprobe and audiowaveform.
//!
//! Every operation shells out to a one-shot external process:
//! 1. `probe` validates a source file and reads duration/bitrate
//! 2. `transcode_to_mp3` produces the playable 320 kbps output
//! 3. `generate_peaks` renders waveform data for the player seek bar
//! 4. `read_tags` / `extract_cover_art` recover embedded metadata
//! 5. `resize_art` / `dominant_color` prepare display artwork
//!
//! The `MediaTools` trait is the seam the processing pipeline depends on,
//! so tests can run the pipeline against a fake without any binaries
//! installed.

mod artwork;
mod metadata;
mod probe;
mod tools;
mod transcode;
mod validate;
mod waveform;

pub use metadata::AudioTags;
pub use probe::AudioProbe;
pub use tools::{
    check_tool_available, warn_missing_tools, FfmpegMediaTools, MediaToolError, MediaTools,
    MediaToolsConfig,
};
pub use validate::{validate_audio_upload, validate_image_upload, UploadValidationError};
