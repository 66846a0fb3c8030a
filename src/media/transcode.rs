//! Fixed-format audio transcoding with ffmpeg.

use super::tools::MediaToolError;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Transcode any supported input to a constant 320 kbps MP3, copying
/// container metadata into ID3v2.3 tags. Overwrites an existing output.
pub async fn transcode_to_mp3(
    ffmpeg_bin: &str,
    input: &Path,
    output: &Path,
) -> Result<(), MediaToolError> {
    let result = Command::new(ffmpeg_bin)
        .arg("-i")
        .arg(input)
        .args([
            "-codec:a",
            "libmp3lame",
            "-b:a",
            "320k",
            "-write_id3v2",
            "1",
            "-id3v2_version",
            "3",
            "-map_metadata",
            "0",
            "-y",
        ])
        .arg(output)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        return Err(MediaToolError::TranscodeFailed(
            last_stderr_line(&stderr).to_string(),
        ));
    }

    Ok(())
}

/// ffmpeg logs progress to stderr; the final line carries the actual error.
pub(crate) fn last_stderr_line(stderr: &str) -> &str {
    stderr
        .lines()
        .rev()
        .find(|line| !line.trim().is_empty())
        .unwrap_or("unknown error")
}
