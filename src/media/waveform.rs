//! Waveform peak rendering with audiowaveform.

use super::tools::MediaToolError;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Peak samples per second of audio in the rendered data.
const PIXELS_PER_SECOND: &str = "20";

/// Bit depth of the rendered peaks. Consumers normalize magnitudes by the
/// maximum representable value (127 for 8 bits).
const PEAK_BITS: &str = "8";

/// Render peak/envelope data for an audio file as a JSON document with a
/// `data` array of sample magnitudes.
pub async fn generate_peaks(
    audiowaveform_bin: &str,
    audio: &Path,
    output: &Path,
) -> Result<(), MediaToolError> {
    let result = Command::new(audiowaveform_bin)
        .arg("-i")
        .arg(audio)
        .arg("-o")
        .arg(output)
        .args(["--pixels-per-second", PIXELS_PER_SECOND, "--bits", PEAK_BITS])
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !result.status.success() {
        let stderr = String::from_utf8_lossy(&result.stderr);
        return Err(MediaToolError::WaveformFailed(stderr.trim().to_string()));
    }

    Ok(())
}
