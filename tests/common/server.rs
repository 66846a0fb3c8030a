//! Test server lifecycle management
//!
//! Spawns the real app on a random port with fake media tools and a
//! running scheduler, all rooted in a temp directory that vanishes on
//! drop.

use super::constants::*;
use async_trait::async_trait;
use demotape_server::library::{LibraryStore, SqliteLibraryStore};
use demotape_server::media::{AudioProbe, AudioTags, MediaToolError, MediaTools};
use demotape_server::pipeline::{
    GroupingManager, MediaLayout, ProcessingScheduler, SchedulerConfig, TrackProcessor,
};
use demotape_server::{make_app, RequestsLoggingLevel, ServerConfig};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

/// Fake media tools: no external binaries, deterministic outputs.
///
/// The probe reports a file as corrupt when its content contains the
/// `CORRUPT` marker, so tests can drive the failed-processing path
/// through a normal upload.
struct FakeMediaTools;

/// Transcode output served by the streaming tests: byte i has value i.
pub fn fake_mp3_body() -> Vec<u8> {
    (0..=255u8).collect()
}

#[async_trait]
impl MediaTools for FakeMediaTools {
    async fn probe(&self, path: &Path) -> Result<AudioProbe, MediaToolError> {
        let content = std::fs::read(path).unwrap_or_default();
        if content.windows(7).any(|w| w == b"CORRUPT") {
            Ok(AudioProbe::Invalid {
                reason: "Corrupt or invalid audio file".to_string(),
            })
        } else {
            Ok(AudioProbe::Valid {
                duration_secs: Some(212.5),
                bitrate: Some(1_411_000),
            })
        }
    }

    async fn transcode_to_mp3(&self, _input: &Path, output: &Path) -> Result<(), MediaToolError> {
        std::fs::write(output, fake_mp3_body()).unwrap();
        Ok(())
    }

    async fn generate_peaks(&self, _audio: &Path, output: &Path) -> Result<(), MediaToolError> {
        std::fs::write(output, b"{\"data\":[0,127,-127,64]}").unwrap();
        Ok(())
    }

    async fn read_tags(&self, _path: &Path) -> Result<AudioTags, MediaToolError> {
        Ok(AudioTags::default())
    }

    async fn extract_cover_art(&self, _path: &Path) -> Result<Option<Vec<u8>>, MediaToolError> {
        Ok(None)
    }

    async fn resize_art(&self, image: &[u8], output: &Path) -> Result<(), MediaToolError> {
        std::fs::write(output, image).unwrap();
        Ok(())
    }

    async fn dominant_color(&self, _image: &Path) -> Result<String, MediaToolError> {
        Ok("#336699".to_string())
    }
}

/// Test server instance with an isolated library and data directory.
///
/// When dropped, the server and scheduler shut down and the temp data
/// directory is cleaned up.
pub struct TestServer {
    /// Base URL for making requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// The port the server is listening on
    pub port: u16,

    /// Library store for direct database access in tests
    pub store: Arc<dyn LibraryStore>,

    /// Media path layout rooted at the temp data directory
    pub layout: MediaLayout,

    // Private fields - keep resources alive until drop
    _temp_data_dir: TempDir,
    shutdown: CancellationToken,
    _server_shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a new test server on a random port with a fast scheduler.
    pub async fn spawn() -> Self {
        let temp_data_dir = TempDir::new().expect("Failed to create temp data dir");

        let db_path = temp_data_dir.path().join("library.db");
        let store: Arc<SqliteLibraryStore> =
            Arc::new(SqliteLibraryStore::open(&db_path).expect("Failed to open library store"));
        let store_for_test: Arc<dyn LibraryStore> = store.clone();

        let layout = MediaLayout::new(temp_data_dir.path());
        layout.ensure_dirs().expect("Failed to create media dirs");

        let tools = Arc::new(FakeMediaTools);
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
            SchedulerConfig {
                poll_interval: Duration::from_millis(50),
                rest_delay: Duration::from_millis(1),
            },
        );

        let shutdown = CancellationToken::new();
        tokio::spawn(scheduler.run(shutdown.clone()));

        // Bind to random port
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");
        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();
        let base_url = format!("http://127.0.0.1:{}", port);

        let config = ServerConfig {
            requests_logging_level: RequestsLoggingLevel::None,
            port,
            frontend_dir_path: None,
            max_audio_bytes: TEST_MAX_AUDIO_BYTES,
            max_image_bytes: TEST_MAX_IMAGE_BYTES,
        };
        let app = make_app(
            config,
            store,
            layout.clone(),
            tools,
            grouping,
            scheduler_handle,
        )
        .expect("Failed to build app");

        let (server_shutdown_tx, server_shutdown_rx) = tokio::sync::oneshot::channel::<()>();
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    server_shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            store: store_for_test,
            layout,
            _temp_data_dir: temp_data_dir,
            shutdown,
            _server_shutdown_tx: Some(server_shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    /// Waits for the server to answer /health.
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client
                .get(format!("{}/health", self.base_url))
                .send()
                .await
            {
                Ok(response) if response.status().is_success() => return,
                _ => tokio::time::sleep(Duration::from_millis(POLL_INTERVAL_MS)).await,
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.cancel();
        if let Some(tx) = self._server_shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
