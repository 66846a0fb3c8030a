//! Per-track processing pipeline.
//!
//! One run takes a pending track through validate → transcode → waveform
//! → metadata/art and lands the result with a single `ready` write.
//! Any failure along the way is caught, turned into an operator-readable
//! message and recorded as `failed`; a run never panics the scheduler.

use super::grouping::GroupingManager;
use super::layout::MediaLayout;
use crate::library::{LibraryStore, ProcessedTrack, StoreError, TrackStatus};
use crate::media::{AudioProbe, MediaTools};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Seam between the scheduler and the per-track pipeline.
#[async_trait]
pub trait PipelineRunner: Send + Sync {
    async fn process(&self, track_id: &str) -> Result<(), StoreError>;
}

pub struct TrackProcessor {
    store: Arc<dyn LibraryStore>,
    tools: Arc<dyn MediaTools>,
    layout: MediaLayout,
    grouping: Arc<GroupingManager>,
}

impl TrackProcessor {
    pub fn new(
        store: Arc<dyn LibraryStore>,
        tools: Arc<dyn MediaTools>,
        layout: MediaLayout,
        grouping: Arc<GroupingManager>,
    ) -> Self {
        Self {
            store,
            tools,
            layout,
            grouping,
        }
    }

    /// Run the pipeline for one track. Pipeline failures are recorded on
    /// the track; only a store failure (cannot even record the outcome)
    /// surfaces as an error.
    pub async fn process(&self, track_id: &str) -> Result<(), StoreError> {
        self.store
            .set_track_status(track_id, TrackStatus::Processing)?;

        match self.run_pipeline(track_id).await {
            Ok(()) => {
                info!("Track {} processed successfully", track_id);
                self.fan_out(track_id);
                Ok(())
            }
            Err(err) => {
                error!("Processing failed for track {}: {}", track_id, err);
                self.store.mark_track_failed(track_id, &err.to_string())?;
                Ok(())
            }
        }
    }

    async fn run_pipeline(&self, track_id: &str) -> anyhow::Result<()> {
        let track = self
            .store
            .get_track(track_id)?
            .ok_or_else(|| anyhow::anyhow!("Track {} not found", track_id))?;

        // Source paths are derived from our own layout, but the column is
        // data; refuse anything pointing outside the data root.
        let source = PathBuf::from(&track.audio_path);
        if !self.layout.contains(&source) {
            anyhow::bail!("Audio file path escapes the data directory");
        }

        let probe = self.tools.probe(&source).await?;
        let duration_secs = match probe {
            AudioProbe::Invalid { reason } => {
                anyhow::bail!("FFprobe validation failed: {}", reason)
            }
            AudioProbe::Valid { duration_secs, .. } => duration_secs,
        };

        self.layout.ensure_dirs()?;

        let mp3_path = self.layout.mp3_path(track_id);
        let peaks_path = self.layout.peaks_path(track_id);
        self.tools.transcode_to_mp3(&source, &mp3_path).await?;
        self.tools.generate_peaks(&mp3_path, &peaks_path).await?;

        let tags = self.tools.read_tags(&source).await?;

        // Art is enhancement, not correctness: failures below are logged
        // and the run proceeds without art.
        let cover = match self.tools.extract_cover_art(&source).await {
            Ok(cover) => cover,
            Err(err) => {
                warn!("Cover art extraction failed for track {}: {}", track_id, err);
                None
            }
        };

        let mut art_path = None;
        let mut dominant_color = None;
        if let Some(image) = cover {
            let destination = self.layout.art_path(track_id);
            match self.tools.resize_art(&image, &destination).await {
                Ok(()) => {
                    art_path = Some(destination.to_string_lossy().to_string());
                    match self.tools.dominant_color(&destination).await {
                        Ok(color) => dominant_color = Some(color),
                        Err(err) => {
                            warn!("Color extraction failed for track {}: {}", track_id, err)
                        }
                    }
                }
                Err(err) => {
                    warn!("Cover art processing failed for track {}: {}", track_id, err)
                }
            }
        }

        let result = ProcessedTrack {
            audio_path: mp3_path.to_string_lossy().to_string(),
            peaks_path: peaks_path.to_string_lossy().to_string(),
            duration: duration_secs.map(|d| d.round() as i64),
            bitrate: 320_000,
            title: tags
                .title
                .filter(|t| !t.trim().is_empty())
                .unwrap_or(track.title),
            art_path,
            dominant_color,
        };
        self.store.finish_track_processing(track_id, &result)?;
        Ok(())
    }

    /// Post-success fan-out: refresh aggregates of every collection the
    /// track belongs to, or wrap an ungrouped track in a single. Errors
    /// here do not take the track out of `ready`; they are logged and
    /// recalculated on the next membership change.
    fn fan_out(&self, track_id: &str) {
        let collections = match self.store.collections_for_track(track_id) {
            Ok(collections) => collections,
            Err(err) => {
                warn!("Membership lookup failed for track {}: {}", track_id, err);
                return;
            }
        };

        if collections.is_empty() {
            match self.store.get_track(track_id) {
                Ok(Some(track)) => {
                    if let Err(err) = self.grouping.ensure_single_for_track(&track) {
                        warn!("Auto-grouping failed for track {}: {}", track_id, err);
                    }
                }
                Ok(None) => {}
                Err(err) => warn!("Track reload failed for {}: {}", track_id, err),
            }
            return;
        }

        for collection in &collections {
            if let Err(err) = self.store.recalc_collection_aggregates(&collection.id) {
                warn!(
                    "Aggregate recalculation failed for collection {}: {}",
                    collection.id, err
                );
            }
        }
    }
}

#[async_trait]
impl PipelineRunner for TrackProcessor {
    async fn process(&self, track_id: &str) -> Result<(), StoreError> {
        TrackProcessor::process(self, track_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::{
        CollectionType, NewCollection, NewTrack, SqliteLibraryStore, Track, TrackStatus,
    };
    use crate::media::{AudioTags, MediaToolError};
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Fake tool adapter: writes marker files instead of real media and
    /// records which sources got transcoded.
    #[derive(Default)]
    struct FakeTools {
        probe_invalid: bool,
        transcode_fails: bool,
        resize_fails: bool,
        tags: AudioTags,
        cover: Option<Vec<u8>>,
        transcoded: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl MediaTools for FakeTools {
        async fn probe(&self, _path: &Path) -> Result<AudioProbe, MediaToolError> {
            if self.probe_invalid {
                Ok(AudioProbe::Invalid {
                    reason: "Corrupt or invalid audio file".to_string(),
                })
            } else {
                Ok(AudioProbe::Valid {
                    duration_secs: Some(200.4),
                    bitrate: Some(1_411_000),
                })
            }
        }

        async fn transcode_to_mp3(
            &self,
            input: &Path,
            output: &Path,
        ) -> Result<(), MediaToolError> {
            if self.transcode_fails {
                return Err(MediaToolError::TranscodeFailed("boom".to_string()));
            }
            self.transcoded
                .lock()
                .unwrap()
                .push(input.to_string_lossy().to_string());
            std::fs::write(output, b"mp3").unwrap();
            Ok(())
        }

        async fn generate_peaks(&self, _audio: &Path, output: &Path) -> Result<(), MediaToolError> {
            std::fs::write(output, b"{\"data\":[0,1,2]}").unwrap();
            Ok(())
        }

        async fn read_tags(&self, _path: &Path) -> Result<AudioTags, MediaToolError> {
            Ok(self.tags.clone())
        }

        async fn extract_cover_art(
            &self,
            _path: &Path,
        ) -> Result<Option<Vec<u8>>, MediaToolError> {
            Ok(self.cover.clone())
        }

        async fn resize_art(&self, image: &[u8], output: &Path) -> Result<(), MediaToolError> {
            if self.resize_fails {
                return Err(MediaToolError::ArtworkFailed("bad image".to_string()));
            }
            std::fs::write(output, image).unwrap();
            Ok(())
        }

        async fn dominant_color(&self, _image: &Path) -> Result<String, MediaToolError> {
            Ok("#112233".to_string())
        }
    }

    struct Setup {
        store: Arc<SqliteLibraryStore>,
        layout: MediaLayout,
        _tmp: TempDir,
    }

    fn setup() -> Setup {
        let tmp = TempDir::new().unwrap();
        let layout = MediaLayout::new(tmp.path());
        layout.ensure_dirs().unwrap();
        Setup {
            store: Arc::new(SqliteLibraryStore::in_memory().unwrap()),
            layout,
            _tmp: tmp,
        }
    }

    fn processor(setup: &Setup, tools: FakeTools) -> TrackProcessor {
        let store: Arc<dyn LibraryStore> = setup.store.clone();
        let grouping = Arc::new(GroupingManager::new(store.clone(), setup.layout.clone()));
        TrackProcessor::new(store, Arc::new(tools), setup.layout.clone(), grouping)
    }

    fn insert_pending(setup: &Setup, id: &str) -> Track {
        let source = setup.layout.original_path(id, Some("wav"));
        std::fs::write(&source, b"RIFFdata").unwrap();
        setup
            .store
            .insert_track(&NewTrack {
                id: id.to_string(),
                slug: format!("{}-slug", id),
                title: format!("Upload {}", id),
                original_filename: format!("{}.wav", id),
                audio_path: source.to_string_lossy().to_string(),
                file_size: 8,
            })
            .unwrap();
        setup.store.get_track(id).unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_successful_run_lands_ready_with_derived_fields() {
        let setup = setup();
        insert_pending(&setup, "t1");
        let processor = processor(
            &setup,
            FakeTools {
                tags: AudioTags {
                    title: Some("Real Title".to_string()),
                    artist: Some("Moss".to_string()),
                    album: None,
                },
                cover: Some(b"img".to_vec()),
                ..FakeTools::default()
            },
        );

        processor.process("t1").await.unwrap();

        let track = setup.store.get_track("t1").unwrap().unwrap();
        assert_eq!(track.status, TrackStatus::Ready);
        assert_eq!(track.duration, Some(200));
        assert_eq!(track.bitrate, Some(320_000));
        assert_eq!(track.title, "Real Title");
        assert_eq!(
            track.audio_path,
            setup.layout.mp3_path("t1").to_string_lossy()
        );
        assert_eq!(
            track.peaks_path.as_deref(),
            Some(setup.layout.peaks_path("t1").to_string_lossy().as_ref())
        );
        assert_eq!(
            track.art_path.as_deref(),
            Some(setup.layout.art_path("t1").to_string_lossy().as_ref())
        );
        assert_eq!(track.dominant_color.as_deref(), Some("#112233"));
        assert!(track.error_message.is_none());
        assert!(setup.layout.mp3_path("t1").exists());
        assert!(setup.layout.peaks_path("t1").exists());
    }

    #[tokio::test]
    async fn test_success_wraps_ungrouped_track_in_single() {
        let setup = setup();
        insert_pending(&setup, "t1");
        let processor = processor(&setup, FakeTools::default());

        processor.process("t1").await.unwrap();

        let collections = setup.store.collections_for_track("t1").unwrap();
        assert_eq!(collections.len(), 1);
        let single = &collections[0];
        assert_eq!(single.collection_type, CollectionType::Single);
        assert_eq!(single.slug, "t1-slug");
        assert_eq!(single.track_count, 1);
        assert_eq!(single.total_duration, 200);
    }

    #[tokio::test]
    async fn test_success_refreshes_existing_memberships_without_single() {
        let setup = setup();
        insert_pending(&setup, "t1");
        setup
            .store
            .insert_collection(&NewCollection {
                id: "album".to_string(),
                slug: "album".to_string(),
                title: "Album".to_string(),
                description: None,
                collection_type: CollectionType::Album,
                artist: None,
                art_path: None,
                dominant_color: None,
            })
            .unwrap();
        setup
            .store
            .add_track_to_collection("album", "t1", None)
            .unwrap();

        let processor = processor(&setup, FakeTools::default());
        processor.process("t1").await.unwrap();

        let album = setup.store.get_collection("album").unwrap().unwrap();
        assert_eq!(album.track_count, 1);
        assert_eq!(album.total_duration, 200);
        // no extra single wrapper
        assert_eq!(setup.store.collections_for_track("t1").unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_probe_fails_run() {
        let setup = setup();
        insert_pending(&setup, "t1");
        let processor = processor(
            &setup,
            FakeTools {
                probe_invalid: true,
                ..FakeTools::default()
            },
        );

        processor.process("t1").await.unwrap();

        let track = setup.store.get_track("t1").unwrap().unwrap();
        assert_eq!(track.status, TrackStatus::Failed);
        assert_eq!(
            track.error_message.as_deref(),
            Some("FFprobe validation failed: Corrupt or invalid audio file")
        );
    }

    #[tokio::test]
    async fn test_transcode_failure_records_tool_message() {
        let setup = setup();
        insert_pending(&setup, "t1");
        let processor = processor(
            &setup,
            FakeTools {
                transcode_fails: true,
                ..FakeTools::default()
            },
        );

        processor.process("t1").await.unwrap();

        let track = setup.store.get_track("t1").unwrap().unwrap();
        assert_eq!(track.status, TrackStatus::Failed);
        assert_eq!(
            track.error_message.as_deref(),
            Some("ffmpeg transcode failed: boom")
        );
    }

    #[tokio::test]
    async fn test_art_failure_is_not_fatal() {
        let setup = setup();
        insert_pending(&setup, "t1");
        let processor = processor(
            &setup,
            FakeTools {
                cover: Some(b"img".to_vec()),
                resize_fails: true,
                ..FakeTools::default()
            },
        );

        processor.process("t1").await.unwrap();

        let track = setup.store.get_track("t1").unwrap().unwrap();
        assert_eq!(track.status, TrackStatus::Ready);
        assert!(track.art_path.is_none());
        assert!(track.dominant_color.is_none());
    }

    #[tokio::test]
    async fn test_source_outside_data_root_is_rejected() {
        let setup = setup();
        insert_pending(&setup, "t1");
        setup
            .store
            .reset_track_for_reupload(
                "t1",
                &crate::library::ReuploadedTrack {
                    original_filename: "evil.wav".to_string(),
                    audio_path: "/etc/passwd".to_string(),
                    file_size: 8,
                },
            )
            .unwrap();

        let tools = FakeTools::default();
        let processor = processor(&setup, tools);
        processor.process("t1").await.unwrap();

        let track = setup.store.get_track("t1").unwrap().unwrap();
        assert_eq!(track.status, TrackStatus::Failed);
        assert_eq!(
            track.error_message.as_deref(),
            Some("Audio file path escapes the data directory")
        );
    }

    #[tokio::test]
    async fn test_missing_tag_title_keeps_upload_title() {
        let setup = setup();
        insert_pending(&setup, "t1");
        let processor = processor(
            &setup,
            FakeTools {
                tags: AudioTags {
                    title: Some("   ".to_string()),
                    artist: None,
                    album: None,
                },
                ..FakeTools::default()
            },
        );

        processor.process("t1").await.unwrap();

        let track = setup.store.get_track("t1").unwrap().unwrap();
        assert_eq!(track.title, "Upload t1");
    }
}
