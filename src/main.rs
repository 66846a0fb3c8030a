use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use demotape_server::config::{AppConfig, CliConfig, FileConfig};
use demotape_server::library::SqliteLibraryStore;
use demotape_server::media::{warn_missing_tools, FfmpegMediaTools, MediaToolsConfig};
use demotape_server::pipeline::{
    GroupingManager, MediaLayout, ProcessingScheduler, SchedulerConfig, TrackProcessor,
};
use demotape_server::{run_server, RequestsLoggingLevel, ServerConfig};

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to a TOML config file. File values take precedence over flags.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// Directory holding the media files and, by default, the library database.
    #[clap(long, value_parser = parse_path)]
    pub data_dir: Option<PathBuf>,

    /// Path to the SQLite library database file. Defaults to <data-dir>/library.db.
    #[clap(long, value_parser = parse_path)]
    pub db_path: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Path to the frontend directory to be statically served.
    #[clap(long)]
    pub frontend_dir_path: Option<String>,
}

impl From<&CliArgs> for CliConfig {
    fn from(args: &CliArgs) -> Self {
        CliConfig {
            data_dir: args.data_dir.clone(),
            db_path: args.db_path.clone(),
            port: args.port,
            logging_level: args.logging_level.clone(),
            frontend_dir_path: args.frontend_dir_path.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .try_init()
        .unwrap();

    let file_config = match &cli_args.config {
        Some(path) => {
            info!("Loading config file {:?}", path);
            Some(FileConfig::load(path)?)
        }
        None => None,
    };
    let config = AppConfig::resolve(&CliConfig::from(&cli_args), file_config)?;

    let tools_config = MediaToolsConfig::from(&config.tools);
    warn_missing_tools(&tools_config).await;

    let db_path = config.library_db_path();
    if db_path.exists() {
        info!("Opening library database at {:?}...", db_path);
    } else {
        info!("Creating new library database at {:?}...", db_path);
    }
    let store = Arc::new(SqliteLibraryStore::open(&db_path)?);

    let layout = MediaLayout::new(&config.data_dir);
    layout.ensure_dirs()?;

    let tools = Arc::new(FfmpegMediaTools::new(tools_config));
    let grouping = Arc::new(GroupingManager::new(store.clone(), layout.clone()));
    let processor = Arc::new(TrackProcessor::new(
        store.clone(),
        tools.clone(),
        layout.clone(),
        grouping.clone(),
    ));
    let (scheduler, scheduler_handle) = ProcessingScheduler::new(
        store.clone(),
        processor,
        SchedulerConfig::from(&config.scheduler),
    );

    let shutdown = CancellationToken::new();
    let scheduler_task = tokio::spawn(scheduler.run(shutdown.clone()));

    let server_config = ServerConfig {
        requests_logging_level: config.logging_level.clone(),
        port: config.port,
        frontend_dir_path: config.frontend_dir_path.clone(),
        max_audio_bytes: config.upload.max_audio_bytes(),
        max_image_bytes: config.upload.max_image_bytes(),
    };

    info!("Ready to serve at port {}!", config.port);
    let result = tokio::select! {
        r = run_server(server_config, store, layout, tools, grouping, scheduler_handle) => r,
        _ = tokio::signal::ctrl_c() => {
            info!("Shutting down...");
            Ok(())
        }
    };

    // Let an in-flight track finish before exiting.
    shutdown.cancel();
    let _ = scheduler_task.await;

    result
}
