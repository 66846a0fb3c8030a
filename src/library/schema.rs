//! Database schema for the track library.
//!
//! Single-database layout:
//! - tracks: One record per uploaded track, including processing state
//! - collections: Albums, playlists and auto-managed singles
//! - collection_tracks: Ordered membership
//! - tags / track_tags: Free-form labels

/// SQL schema for the library database.
pub const LIBRARY_SCHEMA_SQL: &str = r#"
-- Uploaded tracks and their processing lifecycle
CREATE TABLE IF NOT EXISTS tracks (
    id TEXT PRIMARY KEY,
    slug TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    description TEXT,

    -- Derived media facts (null until processing completes)
    duration INTEGER,
    bitrate INTEGER,
    peaks_path TEXT,
    art_path TEXT,
    dominant_color TEXT,

    -- Source file
    file_size INTEGER,
    original_filename TEXT,
    audio_path TEXT NOT NULL,

    -- Lifecycle
    status TEXT NOT NULL DEFAULT 'pending',
    error_message TEXT,

    category TEXT NOT NULL DEFAULT 'track',
    play_count INTEGER NOT NULL DEFAULT 0,

    -- Timestamps (Unix milliseconds)
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

-- Albums, playlists and auto-managed single wrappers
CREATE TABLE IF NOT EXISTS collections (
    id TEXT PRIMARY KEY,
    slug TEXT NOT NULL UNIQUE,
    title TEXT NOT NULL,
    description TEXT,
    type TEXT NOT NULL,
    artist TEXT,
    art_path TEXT,
    dominant_color TEXT,
    sort_order INTEGER NOT NULL DEFAULT 0,

    -- Denormalized aggregates, maintained by recalculation
    track_count INTEGER NOT NULL DEFAULT 0,
    total_duration INTEGER NOT NULL DEFAULT 0,

    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

-- Ordered collection membership
CREATE TABLE IF NOT EXISTS collection_tracks (
    collection_id TEXT NOT NULL,
    track_id TEXT NOT NULL,
    position INTEGER NOT NULL DEFAULT 0,
    PRIMARY KEY (collection_id, track_id),
    FOREIGN KEY (collection_id) REFERENCES collections(id) ON DELETE CASCADE,
    FOREIGN KEY (track_id) REFERENCES tracks(id) ON DELETE CASCADE
);

-- Free-form labels
CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS track_tags (
    track_id TEXT NOT NULL,
    tag_id INTEGER NOT NULL,
    PRIMARY KEY (track_id, tag_id),
    FOREIGN KEY (track_id) REFERENCES tracks(id) ON DELETE CASCADE,
    FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE CASCADE
);

-- Indexes
CREATE INDEX IF NOT EXISTS idx_tracks_status_created ON tracks(status, created_at);
CREATE INDEX IF NOT EXISTS idx_collection_tracks_track ON collection_tracks(track_id);
CREATE INDEX IF NOT EXISTS idx_collections_type ON collections(type);
"#;
