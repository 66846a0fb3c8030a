mod file_config;

pub use file_config::{FileConfig, SchedulerFileConfig, ToolsConfig, UploadConfig};

use crate::media::MediaToolsConfig;
use crate::pipeline::SchedulerConfig;
use crate::server::RequestsLoggingLevel;
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::path::PathBuf;
use std::time::Duration;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub data_dir: Option<PathBuf>,
    pub db_path: Option<PathBuf>,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    // Core settings
    pub data_dir: PathBuf,
    pub db_path: Option<PathBuf>,
    pub port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub frontend_dir_path: Option<String>,

    // Feature configs (with defaults)
    pub tools: ToolsSettings,
    pub scheduler: SchedulerSettings,
    pub upload: UploadSettings,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        // TOML overrides CLI for each field
        let data_dir = file
            .data_dir
            .map(PathBuf::from)
            .or_else(|| cli.data_dir.clone())
            .ok_or_else(|| {
                anyhow::anyhow!("data_dir must be specified via --data-dir or in config file")
            })?;

        // Validate data_dir exists
        if !data_dir.exists() {
            bail!("Data directory does not exist: {:?}", data_dir);
        }
        if !data_dir.is_dir() {
            bail!("data_dir is not a directory: {:?}", data_dir);
        }

        let db_path = file.db_path.map(PathBuf::from).or_else(|| cli.db_path.clone());

        let port = file.port.unwrap_or(cli.port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let frontend_dir_path = file
            .frontend_dir_path
            .or_else(|| cli.frontend_dir_path.clone());

        // Tool settings - merge file config with defaults
        let tools_file = file.tools.unwrap_or_default();
        let tools = ToolsSettings {
            ffmpeg_bin: tools_file.ffmpeg_bin.unwrap_or_else(|| "ffmpeg".to_string()),
            ffprobe_bin: tools_file
                .ffprobe_bin
                .unwrap_or_else(|| "ffprobe".to_string()),
            audiowaveform_bin: tools_file
                .audiowaveform_bin
                .unwrap_or_else(|| "audiowaveform".to_string()),
            timeout_sec: tools_file.timeout_sec,
        };

        let scheduler_file = file.scheduler.unwrap_or_default();
        let scheduler = SchedulerSettings {
            poll_interval_sec: scheduler_file.poll_interval_sec.unwrap_or(5),
            rest_delay_ms: scheduler_file.rest_delay_ms.unwrap_or(100),
        };

        let upload_file = file.upload.unwrap_or_default();
        let upload = UploadSettings {
            max_audio_mb: upload_file.max_audio_mb.unwrap_or(200),
            max_image_mb: upload_file.max_image_mb.unwrap_or(10),
        };

        Ok(Self {
            data_dir,
            db_path,
            port,
            logging_level,
            frontend_dir_path,
            tools,
            scheduler,
            upload,
        })
    }

    pub fn library_db_path(&self) -> PathBuf {
        self.db_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("library.db"))
    }
}

#[derive(Debug, Clone)]
pub struct ToolsSettings {
    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
    pub audiowaveform_bin: String,
    pub timeout_sec: Option<u64>,
}

impl Default for ToolsSettings {
    fn default() -> Self {
        Self {
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: "ffprobe".to_string(),
            audiowaveform_bin: "audiowaveform".to_string(),
            timeout_sec: None,
        }
    }
}

impl From<&ToolsSettings> for MediaToolsConfig {
    fn from(settings: &ToolsSettings) -> Self {
        MediaToolsConfig {
            ffmpeg_bin: settings.ffmpeg_bin.clone(),
            ffprobe_bin: settings.ffprobe_bin.clone(),
            audiowaveform_bin: settings.audiowaveform_bin.clone(),
            timeout: settings.timeout_sec.map(Duration::from_secs),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerSettings {
    pub poll_interval_sec: u64,
    pub rest_delay_ms: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            poll_interval_sec: 5,
            rest_delay_ms: 100,
        }
    }
}

impl From<&SchedulerSettings> for SchedulerConfig {
    fn from(settings: &SchedulerSettings) -> Self {
        SchedulerConfig {
            poll_interval: Duration::from_secs(settings.poll_interval_sec),
            rest_delay: Duration::from_millis(settings.rest_delay_ms),
        }
    }
}

#[derive(Debug, Clone)]
pub struct UploadSettings {
    pub max_audio_mb: u64,
    pub max_image_mb: u64,
}

impl Default for UploadSettings {
    fn default() -> Self {
        Self {
            max_audio_mb: 200,
            max_image_mb: 10,
        }
    }
}

impl UploadSettings {
    pub fn max_audio_bytes(&self) -> u64 {
        self.max_audio_mb * 1024 * 1024
    }

    pub fn max_image_bytes(&self) -> u64 {
        self.max_image_mb * 1024 * 1024
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
