//! SQLite store for the track library.
//!
//! Single database holding:
//! - Tracks (upload state machine included)
//! - Collections and ordered membership
//! - Tags
//!
//! All writes are single statements; aggregate maintenance goes through
//! `recalc_collection_aggregates` so concurrent callers converge on the
//! same totals.

use super::models::{
    Collection, CollectionEdit, CollectionType, NewCollection, NewTrack, ProcessedTrack,
    ReuploadedTrack, Track, TrackCategory, TrackEdit, TrackStatus,
};
use super::schema::LIBRARY_SCHEMA_SQL;
use anyhow::Context;
use chrono::Utc;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("unique constraint violated: {constraint}")]
    UniqueViolation { constraint: String },

    #[error("database error: {0}")]
    Sqlite(rusqlite::Error),
}

impl StoreError {
    /// True when the violated constraint is a slug column, regardless of table.
    pub fn is_slug_conflict(&self) -> bool {
        matches!(self, StoreError::UniqueViolation { constraint } if constraint.ends_with(".slug"))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(code, Some(message)) = &err {
            if code.code == rusqlite::ErrorCode::ConstraintViolation {
                if let Some(constraint) = message.strip_prefix("UNIQUE constraint failed: ") {
                    return StoreError::UniqueViolation {
                        constraint: constraint.to_string(),
                    };
                }
            }
        }
        StoreError::Sqlite(err)
    }
}

/// Trait for library storage operations.
pub trait LibraryStore: Send + Sync {
    // ==================== Track Operations ====================

    /// Insert a freshly uploaded track in `pending` status.
    fn insert_track(&self, track: &NewTrack) -> Result<(), StoreError>;

    /// Get a track by ID.
    fn get_track(&self, id: &str) -> Result<Option<Track>, StoreError>;

    /// Get a track by slug.
    fn get_track_by_slug(&self, slug: &str) -> Result<Option<Track>, StoreError>;

    /// List all tracks, newest first.
    fn list_tracks(&self) -> Result<Vec<Track>, StoreError>;

    /// Case-insensitive title substring search.
    fn search_tracks(&self, query: &str, limit: usize) -> Result<Vec<Track>, StoreError>;

    /// Whether a track slug is already in use.
    fn track_slug_taken(&self, slug: &str) -> Result<bool, StoreError>;

    /// Whether a track slug is in use by a different track.
    fn track_slug_taken_by_other(&self, slug: &str, track_id: &str) -> Result<bool, StoreError>;

    /// Apply an edit to a track's user-facing fields.
    fn update_track(&self, id: &str, edit: &TrackEdit) -> Result<bool, StoreError>;

    /// Increment the play counter.
    fn increment_play_count(&self, id: &str) -> Result<bool, StoreError>;

    /// Set the category on a batch of tracks.
    fn set_tracks_category(
        &self,
        ids: &[String],
        category: TrackCategory,
    ) -> Result<usize, StoreError>;

    /// Delete a batch of tracks. Memberships and tag links cascade.
    fn delete_tracks(&self, ids: &[String]) -> Result<usize, StoreError>;

    // ==================== Processing State ====================

    /// The pending track with the oldest creation timestamp, if any.
    fn oldest_pending_track(&self) -> Result<Option<Track>, StoreError>;

    /// Reset every `processing` track back to `pending`. Returns the count.
    fn reset_processing_tracks(&self) -> Result<usize, StoreError>;

    /// Set a track's status.
    fn set_track_status(&self, id: &str, status: TrackStatus) -> Result<bool, StoreError>;

    /// Mark a track `failed` with an error message.
    fn mark_track_failed(&self, id: &str, message: &str) -> Result<bool, StoreError>;

    /// Apply a successful processing result and transition to `ready`
    /// in a single write. Art fields are kept when the result has none.
    fn finish_track_processing(
        &self,
        id: &str,
        result: &ProcessedTrack,
    ) -> Result<bool, StoreError>;

    /// Point a track at a replacement source file: back to `pending`,
    /// derived columns and error cleared, play count kept.
    fn reset_track_for_reupload(
        &self,
        id: &str,
        upload: &ReuploadedTrack,
    ) -> Result<bool, StoreError>;

    // ==================== Collection Operations ====================

    /// Insert a collection.
    fn insert_collection(&self, collection: &NewCollection) -> Result<(), StoreError>;

    /// Get a collection by ID.
    fn get_collection(&self, id: &str) -> Result<Option<Collection>, StoreError>;

    /// Get a collection by slug.
    fn get_collection_by_slug(&self, slug: &str) -> Result<Option<Collection>, StoreError>;

    /// List all collections ordered by sort order.
    fn list_collections(&self) -> Result<Vec<Collection>, StoreError>;

    /// Whether a collection slug is already in use.
    fn collection_slug_taken(&self, slug: &str) -> Result<bool, StoreError>;

    /// Whether a collection slug is in use by a different collection.
    fn collection_slug_taken_by_other(
        &self,
        slug: &str,
        collection_id: &str,
    ) -> Result<bool, StoreError>;

    /// Apply an edit to a collection's user-facing fields.
    fn update_collection(&self, id: &str, edit: &CollectionEdit) -> Result<bool, StoreError>;

    /// Point a collection at a new art file and dominant color.
    fn set_collection_art(
        &self,
        id: &str,
        art_path: &str,
        dominant_color: Option<&str>,
    ) -> Result<bool, StoreError>;

    /// Delete a collection. Memberships cascade, tracks survive.
    fn delete_collection(&self, id: &str) -> Result<bool, StoreError>;

    /// Persist a full manual ordering of collections.
    fn set_collections_order(&self, ids: &[String]) -> Result<(), StoreError>;

    // ==================== Membership ====================

    /// Add a track to a collection. Without an explicit position the track
    /// is appended after the current maximum. Re-adding is a no-op.
    /// Returns the position used.
    fn add_track_to_collection(
        &self,
        collection_id: &str,
        track_id: &str,
        position: Option<i64>,
    ) -> Result<i64, StoreError>;

    /// Remove a track from a collection.
    fn remove_track_from_collection(
        &self,
        collection_id: &str,
        track_id: &str,
    ) -> Result<bool, StoreError>;

    /// Overwrite positions for the given members of a collection.
    fn set_track_positions(
        &self,
        collection_id: &str,
        positions: &[(String, i64)],
    ) -> Result<(), StoreError>;

    /// Tracks of a collection in position order.
    fn tracks_in_collection(&self, collection_id: &str) -> Result<Vec<Track>, StoreError>;

    /// Collections a track belongs to.
    fn collections_for_track(&self, track_id: &str) -> Result<Vec<Collection>, StoreError>;

    /// Distinct IDs of collections containing any of the given tracks.
    fn collections_for_tracks(&self, track_ids: &[String]) -> Result<Vec<String>, StoreError>;

    /// Single-type collections containing the track, optionally excluding one.
    fn single_collections_for_track(
        &self,
        track_id: &str,
        exclude: Option<&str>,
    ) -> Result<Vec<Collection>, StoreError>;

    // ==================== Aggregates ====================

    /// Recompute `track_count` and `total_duration` from current membership.
    /// Members count regardless of status; missing durations count as zero.
    fn recalc_collection_aggregates(&self, collection_id: &str) -> Result<(), StoreError>;

    // ==================== Tags ====================

    /// Attach tags to a batch of tracks, creating tag rows as needed.
    fn add_tags_to_tracks(&self, track_ids: &[String], names: &[String])
        -> Result<(), StoreError>;

    /// Replace a track's tag set.
    fn set_track_tags(&self, track_id: &str, names: &[String]) -> Result<(), StoreError>;

    /// Tag names for a track, sorted.
    fn tags_for_track(&self, track_id: &str) -> Result<Vec<String>, StoreError>;
}

/// SQLite implementation of LibraryStore.
pub struct SqliteLibraryStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteLibraryStore {
    /// Open or create a library database.
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open library database: {:?}", path))?;

        // WAL keeps readers unblocked while the pipeline writes
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        conn.execute_batch(LIBRARY_SCHEMA_SQL)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory database (for testing).
    #[cfg(test)]
    pub fn in_memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        conn.execute_batch(LIBRARY_SCHEMA_SQL)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn row_to_track(row: &rusqlite::Row) -> rusqlite::Result<Track> {
        Ok(Track {
            id: row.get("id")?,
            slug: row.get("slug")?,
            title: row.get("title")?,
            description: row.get("description")?,
            duration: row.get("duration")?,
            bitrate: row.get("bitrate")?,
            file_size: row.get("file_size")?,
            original_filename: row.get("original_filename")?,
            audio_path: row.get("audio_path")?,
            peaks_path: row.get("peaks_path")?,
            art_path: row.get("art_path")?,
            dominant_color: row.get("dominant_color")?,
            error_message: row.get("error_message")?,
            category: TrackCategory::parse(&row.get::<_, String>("category")?).unwrap_or_default(),
            status: TrackStatus::parse(&row.get::<_, String>("status")?)
                .unwrap_or(TrackStatus::Pending),
            play_count: row.get("play_count")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }

    fn row_to_collection(row: &rusqlite::Row) -> rusqlite::Result<Collection> {
        Ok(Collection {
            id: row.get("id")?,
            slug: row.get("slug")?,
            title: row.get("title")?,
            description: row.get("description")?,
            collection_type: CollectionType::parse(&row.get::<_, String>("type")?)
                .unwrap_or(CollectionType::Playlist),
            artist: row.get("artist")?,
            art_path: row.get("art_path")?,
            dominant_color: row.get("dominant_color")?,
            sort_order: row.get("sort_order")?,
            track_count: row.get("track_count")?,
            total_duration: row.get("total_duration")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

impl LibraryStore for SqliteLibraryStore {
    // ==================== Track Operations ====================

    fn insert_track(&self, track: &NewTrack) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().timestamp_millis();
        conn.execute(
            r#"
            INSERT INTO tracks (
                id, slug, title, original_filename, audio_path, file_size,
                status, category, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'pending', 'track', ?7, ?7)
            "#,
            params![
                track.id,
                track.slug,
                track.title,
                track.original_filename,
                track.audio_path,
                track.file_size,
                now,
            ],
        )?;
        Ok(())
    }

    fn get_track(&self, id: &str) -> Result<Option<Track>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let result = conn
            .query_row(
                "SELECT * FROM tracks WHERE id = ?1",
                params![id],
                Self::row_to_track,
            )
            .optional()?;
        Ok(result)
    }

    fn get_track_by_slug(&self, slug: &str) -> Result<Option<Track>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let result = conn
            .query_row(
                "SELECT * FROM tracks WHERE slug = ?1",
                params![slug],
                Self::row_to_track,
            )
            .optional()?;
        Ok(result)
    }

    fn list_tracks(&self) -> Result<Vec<Track>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare("SELECT * FROM tracks ORDER BY created_at DESC, rowid DESC")?;
        let tracks = stmt
            .query_map([], Self::row_to_track)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tracks)
    }

    fn search_tracks(&self, query: &str, limit: usize) -> Result<Vec<Track>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT * FROM tracks WHERE title LIKE ?1 ORDER BY created_at DESC LIMIT ?2",
        )?;
        let pattern = format!("%{}%", query);
        let tracks = stmt
            .query_map(params![pattern, limit as i64], Self::row_to_track)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tracks)
    }

    fn track_slug_taken(&self, slug: &str) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap();
        let taken: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM tracks WHERE slug = ?1)",
            params![slug],
            |row| row.get(0),
        )?;
        Ok(taken)
    }

    fn track_slug_taken_by_other(&self, slug: &str, track_id: &str) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap();
        let taken: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM tracks WHERE slug = ?1 AND id != ?2)",
            params![slug, track_id],
            |row| row.get(0),
        )?;
        Ok(taken)
    }

    fn update_track(&self, id: &str, edit: &TrackEdit) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap();
        let affected = conn.execute(
            r#"
            UPDATE tracks SET
                title = ?2, description = ?3, category = ?4, slug = ?5, updated_at = ?6
            WHERE id = ?1
            "#,
            params![
                id,
                edit.title,
                edit.description,
                edit.category.as_str(),
                edit.slug,
                Utc::now().timestamp_millis(),
            ],
        )?;
        Ok(affected > 0)
    }

    fn increment_play_count(&self, id: &str) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap();
        let affected = conn.execute(
            "UPDATE tracks SET play_count = play_count + 1 WHERE id = ?1",
            params![id],
        )?;
        Ok(affected > 0)
    }

    fn set_tracks_category(
        &self,
        ids: &[String],
        category: TrackCategory,
    ) -> Result<usize, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().timestamp_millis();
        let mut updated = 0;
        for id in ids {
            updated += conn.execute(
                "UPDATE tracks SET category = ?2, updated_at = ?3 WHERE id = ?1",
                params![id, category.as_str(), now],
            )?;
        }
        Ok(updated)
    }

    fn delete_tracks(&self, ids: &[String]) -> Result<usize, StoreError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let conn = self.conn.lock().unwrap();
        let placeholders = ids.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
        let sql = format!("DELETE FROM tracks WHERE id IN ({})", placeholders);
        let deleted = conn.execute(&sql, params_from_iter(ids.iter()))?;
        Ok(deleted)
    }

    // ==================== Processing State ====================

    fn oldest_pending_track(&self) -> Result<Option<Track>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let result = conn
            .query_row(
                "SELECT * FROM tracks WHERE status = 'pending' ORDER BY created_at ASC, rowid ASC LIMIT 1",
                [],
                Self::row_to_track,
            )
            .optional()?;
        Ok(result)
    }

    fn reset_processing_tracks(&self) -> Result<usize, StoreError> {
        let conn = self.conn.lock().unwrap();
        let affected = conn.execute(
            "UPDATE tracks SET status = 'pending', updated_at = ?1 WHERE status = 'processing'",
            params![Utc::now().timestamp_millis()],
        )?;
        Ok(affected)
    }

    fn set_track_status(&self, id: &str, status: TrackStatus) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap();
        let affected = conn.execute(
            "UPDATE tracks SET status = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, status.as_str(), Utc::now().timestamp_millis()],
        )?;
        Ok(affected > 0)
    }

    fn mark_track_failed(&self, id: &str, message: &str) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap();
        let affected = conn.execute(
            "UPDATE tracks SET status = 'failed', error_message = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, message, Utc::now().timestamp_millis()],
        )?;
        Ok(affected > 0)
    }

    fn finish_track_processing(
        &self,
        id: &str,
        result: &ProcessedTrack,
    ) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap();
        let affected = conn.execute(
            r#"
            UPDATE tracks SET
                status = 'ready',
                audio_path = ?2, peaks_path = ?3,
                duration = ?4, bitrate = ?5, title = ?6,
                art_path = COALESCE(?7, art_path),
                dominant_color = COALESCE(?8, dominant_color),
                updated_at = ?9
            WHERE id = ?1
            "#,
            params![
                id,
                result.audio_path,
                result.peaks_path,
                result.duration,
                result.bitrate,
                result.title,
                result.art_path,
                result.dominant_color,
                Utc::now().timestamp_millis(),
            ],
        )?;
        Ok(affected > 0)
    }

    fn reset_track_for_reupload(
        &self,
        id: &str,
        upload: &ReuploadedTrack,
    ) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap();
        let affected = conn.execute(
            r#"
            UPDATE tracks SET
                status = 'pending',
                original_filename = ?2, audio_path = ?3, file_size = ?4,
                duration = NULL, bitrate = NULL, peaks_path = NULL,
                art_path = NULL, dominant_color = NULL, error_message = NULL,
                updated_at = ?5
            WHERE id = ?1
            "#,
            params![
                id,
                upload.original_filename,
                upload.audio_path,
                upload.file_size,
                Utc::now().timestamp_millis(),
            ],
        )?;
        Ok(affected > 0)
    }

    // ==================== Collection Operations ====================

    fn insert_collection(&self, collection: &NewCollection) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().timestamp_millis();
        conn.execute(
            r#"
            INSERT INTO collections (
                id, slug, title, description, type, artist,
                art_path, dominant_color, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?9)
            "#,
            params![
                collection.id,
                collection.slug,
                collection.title,
                collection.description,
                collection.collection_type.as_str(),
                collection.artist,
                collection.art_path,
                collection.dominant_color,
                now,
            ],
        )?;
        Ok(())
    }

    fn get_collection(&self, id: &str) -> Result<Option<Collection>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let result = conn
            .query_row(
                "SELECT * FROM collections WHERE id = ?1",
                params![id],
                Self::row_to_collection,
            )
            .optional()?;
        Ok(result)
    }

    fn get_collection_by_slug(&self, slug: &str) -> Result<Option<Collection>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let result = conn
            .query_row(
                "SELECT * FROM collections WHERE slug = ?1",
                params![slug],
                Self::row_to_collection,
            )
            .optional()?;
        Ok(result)
    }

    fn list_collections(&self) -> Result<Vec<Collection>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT * FROM collections ORDER BY sort_order ASC, created_at DESC")?;
        let collections = stmt
            .query_map([], Self::row_to_collection)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(collections)
    }

    fn collection_slug_taken(&self, slug: &str) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap();
        let taken: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM collections WHERE slug = ?1)",
            params![slug],
            |row| row.get(0),
        )?;
        Ok(taken)
    }

    fn collection_slug_taken_by_other(
        &self,
        slug: &str,
        collection_id: &str,
    ) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap();
        let taken: bool = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM collections WHERE slug = ?1 AND id != ?2)",
            params![slug, collection_id],
            |row| row.get(0),
        )?;
        Ok(taken)
    }

    fn update_collection(&self, id: &str, edit: &CollectionEdit) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap();
        let affected = conn.execute(
            r#"
            UPDATE collections SET
                title = ?2, description = ?3, artist = ?4, slug = ?5, updated_at = ?6
            WHERE id = ?1
            "#,
            params![
                id,
                edit.title,
                edit.description,
                edit.artist,
                edit.slug,
                Utc::now().timestamp_millis(),
            ],
        )?;
        Ok(affected > 0)
    }

    fn set_collection_art(
        &self,
        id: &str,
        art_path: &str,
        dominant_color: Option<&str>,
    ) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap();
        let affected = conn.execute(
            r#"
            UPDATE collections SET
                art_path = ?2, dominant_color = ?3, updated_at = ?4
            WHERE id = ?1
            "#,
            params![id, art_path, dominant_color, Utc::now().timestamp_millis()],
        )?;
        Ok(affected > 0)
    }

    fn delete_collection(&self, id: &str) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap();
        let affected = conn.execute("DELETE FROM collections WHERE id = ?1", params![id])?;
        Ok(affected > 0)
    }

    fn set_collections_order(&self, ids: &[String]) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        let now = Utc::now().timestamp_millis();
        for (index, id) in ids.iter().enumerate() {
            conn.execute(
                "UPDATE collections SET sort_order = ?2, updated_at = ?3 WHERE id = ?1",
                params![id, index as i64, now],
            )?;
        }
        Ok(())
    }

    // ==================== Membership ====================

    fn add_track_to_collection(
        &self,
        collection_id: &str,
        track_id: &str,
        position: Option<i64>,
    ) -> Result<i64, StoreError> {
        let conn = self.conn.lock().unwrap();
        let position = match position {
            Some(p) => p,
            None => {
                let max: Option<i64> = conn.query_row(
                    "SELECT MAX(position) FROM collection_tracks WHERE collection_id = ?1",
                    params![collection_id],
                    |row| row.get(0),
                )?;
                max.map(|m| m + 1).unwrap_or(0)
            }
        };
        conn.execute(
            r#"
            INSERT OR IGNORE INTO collection_tracks (collection_id, track_id, position)
            VALUES (?1, ?2, ?3)
            "#,
            params![collection_id, track_id, position],
        )?;
        Ok(position)
    }

    fn remove_track_from_collection(
        &self,
        collection_id: &str,
        track_id: &str,
    ) -> Result<bool, StoreError> {
        let conn = self.conn.lock().unwrap();
        let affected = conn.execute(
            "DELETE FROM collection_tracks WHERE collection_id = ?1 AND track_id = ?2",
            params![collection_id, track_id],
        )?;
        Ok(affected > 0)
    }

    fn set_track_positions(
        &self,
        collection_id: &str,
        positions: &[(String, i64)],
    ) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        for (track_id, position) in positions {
            conn.execute(
                "UPDATE collection_tracks SET position = ?3 WHERE collection_id = ?1 AND track_id = ?2",
                params![collection_id, track_id, position],
            )?;
        }
        Ok(())
    }

    fn tracks_in_collection(&self, collection_id: &str) -> Result<Vec<Track>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"
            SELECT t.* FROM tracks t
            JOIN collection_tracks ct ON ct.track_id = t.id
            WHERE ct.collection_id = ?1
            ORDER BY ct.position ASC
            "#,
        )?;
        let tracks = stmt
            .query_map(params![collection_id], Self::row_to_track)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(tracks)
    }

    fn collections_for_track(&self, track_id: &str) -> Result<Vec<Collection>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"
            SELECT c.* FROM collections c
            JOIN collection_tracks ct ON ct.collection_id = c.id
            WHERE ct.track_id = ?1
            ORDER BY c.sort_order ASC, c.created_at DESC
            "#,
        )?;
        let collections = stmt
            .query_map(params![track_id], Self::row_to_collection)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(collections)
    }

    fn collections_for_tracks(&self, track_ids: &[String]) -> Result<Vec<String>, StoreError> {
        if track_ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn.lock().unwrap();
        let placeholders = track_ids.iter().map(|_| "?").collect::<Vec<_>>().join(", ");
        let sql = format!(
            "SELECT DISTINCT collection_id FROM collection_tracks WHERE track_id IN ({})",
            placeholders
        );
        let mut stmt = conn.prepare(&sql)?;
        let ids = stmt
            .query_map(params_from_iter(track_ids.iter()), |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(ids)
    }

    fn single_collections_for_track(
        &self,
        track_id: &str,
        exclude: Option<&str>,
    ) -> Result<Vec<Collection>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"
            SELECT c.* FROM collections c
            JOIN collection_tracks ct ON ct.collection_id = c.id
            WHERE ct.track_id = ?1 AND c.type = 'single'
              AND (?2 IS NULL OR c.id != ?2)
            "#,
        )?;
        let collections = stmt
            .query_map(params![track_id, exclude], Self::row_to_collection)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(collections)
    }

    // ==================== Aggregates ====================

    fn recalc_collection_aggregates(&self, collection_id: &str) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            r#"
            UPDATE collections SET
                track_count = (
                    SELECT COUNT(*) FROM collection_tracks ct
                    JOIN tracks t ON t.id = ct.track_id
                    WHERE ct.collection_id = ?1
                ),
                total_duration = (
                    SELECT COALESCE(SUM(t.duration), 0) FROM collection_tracks ct
                    JOIN tracks t ON t.id = ct.track_id
                    WHERE ct.collection_id = ?1
                ),
                updated_at = ?2
            WHERE id = ?1
            "#,
            params![collection_id, Utc::now().timestamp_millis()],
        )?;
        Ok(())
    }

    // ==================== Tags ====================

    fn add_tags_to_tracks(
        &self,
        track_ids: &[String],
        names: &[String],
    ) -> Result<(), StoreError> {
        if track_ids.is_empty() || names.is_empty() {
            return Ok(());
        }
        let conn = self.conn.lock().unwrap();
        for name in names {
            conn.execute("INSERT OR IGNORE INTO tags (name) VALUES (?1)", params![name])?;
            let tag_id: i64 = conn.query_row(
                "SELECT id FROM tags WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )?;
            for track_id in track_ids {
                conn.execute(
                    "INSERT OR IGNORE INTO track_tags (track_id, tag_id) VALUES (?1, ?2)",
                    params![track_id, tag_id],
                )?;
            }
        }
        Ok(())
    }

    fn set_track_tags(&self, track_id: &str, names: &[String]) -> Result<(), StoreError> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "DELETE FROM track_tags WHERE track_id = ?1",
            params![track_id],
        )?;
        for name in names {
            conn.execute("INSERT OR IGNORE INTO tags (name) VALUES (?1)", params![name])?;
            let tag_id: i64 = conn.query_row(
                "SELECT id FROM tags WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )?;
            conn.execute(
                "INSERT OR IGNORE INTO track_tags (track_id, tag_id) VALUES (?1, ?2)",
                params![track_id, tag_id],
            )?;
        }
        Ok(())
    }

    fn tags_for_track(&self, track_id: &str) -> Result<Vec<String>, StoreError> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            r#"
            SELECT t.name FROM tags t
            JOIN track_tags tt ON tt.tag_id = t.id
            WHERE tt.track_id = ?1
            ORDER BY t.name ASC
            "#,
        )?;
        let names = stmt
            .query_map(params![track_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;
        Ok(names)
    }
}
