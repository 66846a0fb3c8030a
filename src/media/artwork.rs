//! Cover art resizing and color extraction.

use super::tools::MediaToolError;
use super::transcode::last_stderr_line;
use std::io::Write;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Square edge length of stored cover art, in pixels.
const ART_SIZE: u32 = 500;

/// Scale so the short edge covers the square, then center-crop.
fn cover_filter() -> String {
    format!(
        "scale={size}:{size}:force_original_aspect_ratio=increase,crop={size}:{size}",
        size = ART_SIZE
    )
}

/// Resize raw image bytes into square JPEG cover art. The bytes are staged
/// through a temp file because ffmpeg needs a seekable input for format
/// detection.
pub async fn resize_art(
    ffmpeg_bin: &str,
    image: &[u8],
    output: &Path,
) -> Result<(), MediaToolError> {
    let mut staged = tempfile::NamedTempFile::new()?;
    staged.write_all(image)?;
    staged.flush()?;

    let result = Command::new(ffmpeg_bin)
        .arg("-i")
        .arg(staged.path())
        .args([
            "-vf",
            &cover_filter(),
            "-frames:v",
            "1",
            "-q:v",
            "4",
            "-f",
            "mjpeg",
            "-y",
        ])
        .arg(output)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        return Err(MediaToolError::ArtworkFailed(
            last_stderr_line(&stderr).to_string(),
        ));
    }

    Ok(())
}

/// Average color of an image as `#rrggbb`, computed by scaling the whole
/// image down to a single pixel.
pub async fn dominant_color(ffmpeg_bin: &str, image: &Path) -> Result<String, MediaToolError> {
    let output = Command::new(ffmpeg_bin)
        .arg("-i")
        .arg(image)
        .args([
            "-vf",
            "scale=1:1",
            "-frames:v",
            "1",
            "-f",
            "rawvideo",
            "-pix_fmt",
            "rgb24",
            "pipe:1",
        ])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(MediaToolError::ArtworkFailed(
            last_stderr_line(&stderr).to_string(),
        ));
    }

    if output.stdout.len() < 3 {
        return Err(MediaToolError::InvalidOutput(
            "no pixel data from color extraction".to_string(),
        ));
    }

    Ok(rgb_to_hex(
        output.stdout[0],
        output.stdout[1],
        output.stdout[2],
    ))
}

fn rgb_to_hex(r: u8, g: u8, b: u8) -> String {
    format!("#{:02x}{:02x}{:02x}", r, g, b)
}
