use serde::{Deserialize, Serialize};

/// Lifecycle of an uploaded track. `Pending` and `Processing` are transient,
/// `Ready` and `Failed` are terminal until a re-upload resets the track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackStatus {
    Pending,
    Processing,
    Ready,
    Failed,
}

impl TrackStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackStatus::Pending => "pending",
            TrackStatus::Processing => "processing",
            TrackStatus::Ready => "ready",
            TrackStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TrackStatus::Pending),
            "processing" => Some(TrackStatus::Processing),
            "ready" => Some(TrackStatus::Ready),
            "failed" => Some(TrackStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TrackStatus::Ready | TrackStatus::Failed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackCategory {
    Track,
    Set,
    Experiment,
    Export,
    Album,
    Playlist,
}

impl TrackCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrackCategory::Track => "track",
            TrackCategory::Set => "set",
            TrackCategory::Experiment => "experiment",
            TrackCategory::Export => "export",
            TrackCategory::Album => "album",
            TrackCategory::Playlist => "playlist",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "track" => Some(TrackCategory::Track),
            "set" => Some(TrackCategory::Set),
            "experiment" => Some(TrackCategory::Experiment),
            "export" => Some(TrackCategory::Export),
            "album" => Some(TrackCategory::Album),
            "playlist" => Some(TrackCategory::Playlist),
            _ => None,
        }
    }
}

impl Default for TrackCategory {
    fn default() -> Self {
        TrackCategory::Track
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollectionType {
    Album,
    Playlist,
    Single,
}

impl CollectionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionType::Album => "album",
            CollectionType::Playlist => "playlist",
            CollectionType::Single => "single",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "album" => Some(CollectionType::Album),
            "playlist" => Some(CollectionType::Playlist),
            "single" => Some(CollectionType::Single),
            _ => None,
        }
    }
}

/// A track row. Derived columns (`duration`, `bitrate`, `peaks_path`,
/// `art_path`, `dominant_color`) are null until processing completes.
/// Timestamps are Unix milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
    pub duration: Option<i64>,
    pub bitrate: Option<i64>,
    pub file_size: Option<i64>,
    pub original_filename: Option<String>,
    pub audio_path: String,
    pub peaks_path: Option<String>,
    pub art_path: Option<String>,
    pub dominant_color: Option<String>,
    pub error_message: Option<String>,
    pub category: TrackCategory,
    pub status: TrackStatus,
    pub play_count: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Fields persisted at upload time, before any processing has run.
#[derive(Debug, Clone)]
pub struct NewTrack {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub original_filename: String,
    pub audio_path: String,
    pub file_size: i64,
}

/// Outcome of a successful processing run, applied in one write together
/// with the transition to `Ready`. Duration stays unset when the probe
/// could not report one.
#[derive(Debug, Clone)]
pub struct ProcessedTrack {
    pub audio_path: String,
    pub peaks_path: String,
    pub duration: Option<i64>,
    pub bitrate: i64,
    pub title: String,
    pub art_path: Option<String>,
    pub dominant_color: Option<String>,
}

/// Replacement source file for an existing track. Resets the row to
/// `Pending` and clears every derived column.
#[derive(Debug, Clone)]
pub struct ReuploadedTrack {
    pub original_filename: String,
    pub audio_path: String,
    pub file_size: i64,
}

/// Full set of editable track fields. Callers merge the patch into the
/// current row and submit the result.
#[derive(Debug, Clone)]
pub struct TrackEdit {
    pub title: String,
    pub description: Option<String>,
    pub category: TrackCategory,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
    #[serde(rename = "type")]
    pub collection_type: CollectionType,
    pub artist: Option<String>,
    pub art_path: Option<String>,
    pub dominant_color: Option<String>,
    pub sort_order: i64,
    pub track_count: i64,
    pub total_duration: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

#[derive(Debug, Clone)]
pub struct NewCollection {
    pub id: String,
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
    pub collection_type: CollectionType,
    pub artist: Option<String>,
    pub art_path: Option<String>,
    pub dominant_color: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CollectionEdit {
    pub title: String,
    pub description: Option<String>,
    pub artist: Option<String>,
    pub slug: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            TrackStatus::Pending,
            TrackStatus::Processing,
            TrackStatus::Ready,
            TrackStatus::Failed,
        ] {
            assert_eq!(TrackStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(TrackStatus::parse("bogus"), None);
    }

    #[test]
    fn test_terminal_statuses() {
        assert!(!TrackStatus::Pending.is_terminal());
        assert!(!TrackStatus::Processing.is_terminal());
        assert!(TrackStatus::Ready.is_terminal());
        assert!(TrackStatus::Failed.is_terminal());
    }

    #[test]
    fn test_category_round_trip() {
        for category in [
            TrackCategory::Track,
            TrackCategory::Set,
            TrackCategory::Experiment,
            TrackCategory::Export,
            TrackCategory::Album,
            TrackCategory::Playlist,
        ] {
            assert_eq!(TrackCategory::parse(category.as_str()), Some(category));
        }
        assert_eq!(TrackCategory::parse(""), None);
    }

    #[test]
    fn test_collection_type_serde_lowercase() {
        let json = serde_json::to_string(&CollectionType::Single).unwrap();
        assert_eq!(json, "\"single\"");
        let parsed: CollectionType = serde_json::from_str("\"album\"").unwrap();
        assert_eq!(parsed, CollectionType::Album);
    }
}
