//! Embedded tag and cover art extraction.

use super::tools::MediaToolError;
use super::transcode::last_stderr_line;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Embedded tags recovered from a source file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AudioTags {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
}

/// Read embedded tags using ffprobe. Tag keys vary in casing between
/// containers (ID3 vs Vorbis comments), so matching is case-insensitive.
pub async fn read_tags(ffprobe_bin: &str, path: &Path) -> Result<AudioTags, MediaToolError> {
    let output = Command::new(ffprobe_bin)
        .args(["-v", "quiet", "-print_format", "json", "-show_format"])
        .arg(path)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(MediaToolError::ProbeFailed(stderr.trim().to_string()));
    }

    let json: serde_json::Value = serde_json::from_slice(&output.stdout)
        .map_err(|e| MediaToolError::InvalidOutput(format!("JSON parse error: {}", e)))?;
    Ok(tags_from_json(&json))
}

fn tags_from_json(json: &serde_json::Value) -> AudioTags {
    let mut tags = AudioTags::default();

    if let Some(obj) = json
        .get("format")
        .and_then(|f| f.get("tags"))
        .and_then(|t| t.as_object())
    {
        for (key, value) in obj {
            if let Some(v) = value.as_str() {
                match key.to_lowercase().as_str() {
                    "title" => tags.title = Some(v.to_string()),
                    "artist" => tags.artist = Some(v.to_string()),
                    "album" => tags.album = Some(v.to_string()),
                    _ => {}
                }
            }
        }
    }

    tags
}

/// Extract the embedded cover image as JPEG bytes. A file without art is
/// a normal outcome and returns `None`.
pub async fn extract_cover_art(
    ffmpeg_bin: &str,
    path: &Path,
) -> Result<Option<Vec<u8>>, MediaToolError> {
    let output = Command::new(ffmpeg_bin)
        .arg("-i")
        .arg(path)
        .args(["-map", "0:v:0", "-frames:v", "1", "-f", "mjpeg", "pipe:1"])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        // ffmpeg exits non-zero when the source has no embedded image stream
        if stderr.contains("matches no streams") {
            return Ok(None);
        }
        return Err(MediaToolError::ArtworkFailed(
            last_stderr_line(&stderr).to_string(),
        ));
    }

    if output.stdout.is_empty() {
        return Ok(None);
    }
    Ok(Some(output.stdout))
}
