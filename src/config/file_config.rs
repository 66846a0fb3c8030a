use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct FileConfig {
    // Core settings (can override CLI)
    pub data_dir: Option<String>,
    pub db_path: Option<String>,
    pub port: Option<u16>,
    pub logging_level: Option<String>,
    pub frontend_dir_path: Option<String>,

    // Feature configs
    pub tools: Option<ToolsConfig>,
    pub scheduler: Option<SchedulerFileConfig>,
    pub upload: Option<UploadConfig>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct ToolsConfig {
    pub ffmpeg_bin: Option<String>,
    pub ffprobe_bin: Option<String>,
    pub audiowaveform_bin: Option<String>,
    /// Per-invocation time limit for external tools. Unset means no limit.
    pub timeout_sec: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct SchedulerFileConfig {
    pub poll_interval_sec: Option<u64>,
    pub rest_delay_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct UploadConfig {
    pub max_audio_mb: Option<u64>,
    pub max_image_mb: Option<u64>,
}

impl FileConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }
}
