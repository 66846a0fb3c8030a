//! Source file inspection with ffprobe.

use super::tools::MediaToolError;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

/// Probe outcome. A corrupt or unreadable file is `Invalid`, which is a
/// normal result, not an error; only tool failures surface as errors.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioProbe {
    Valid {
        /// Duration in seconds, when ffprobe reports one.
        duration_secs: Option<f64>,
        /// Source bitrate in bits per second.
        bitrate: Option<i64>,
    },
    Invalid {
        reason: String,
    },
}

/// ffprobe JSON output structure.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: Option<FfprobeFormat>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    bit_rate: Option<String>,
}

/// Inspect an audio file without decoding it fully.
pub async fn probe_audio(ffprobe_bin: &str, path: &Path) -> Result<AudioProbe, MediaToolError> {
    let output = Command::new(ffprobe_bin)
        .args([
            "-v",
            "error",
            "-show_entries",
            "format=duration,bit_rate",
            "-of",
            "json",
        ])
        .arg(path)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Ok(AudioProbe::Invalid {
            reason: "Corrupt or invalid audio file".to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    Ok(parse_probe_json(&stdout))
}

fn parse_probe_json(stdout: &str) -> AudioProbe {
    let parsed: FfprobeOutput = match serde_json::from_str(stdout) {
        Ok(parsed) => parsed,
        Err(_) => {
            return AudioProbe::Invalid {
                reason: "Failed to parse ffprobe output".to_string(),
            }
        }
    };

    // A successful probe without format entries still counts as valid,
    // it just leaves duration and bitrate unknown.
    let format = parsed.format.unwrap_or(FfprobeFormat {
        duration: None,
        bit_rate: None,
    });

    AudioProbe::Valid {
        duration_secs: format.duration.as_deref().and_then(|d| d.parse().ok()),
        bitrate: format.bit_rate.as_deref().and_then(|b| b.parse().ok()),
    }
}
