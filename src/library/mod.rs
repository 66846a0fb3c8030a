//! Track library: persistent state for uploads, collections and tags.
//!
//! Upload lifecycle:
//! 1. A validated upload inserts a `pending` track row
//! 2. The scheduler claims it (`processing`) and runs the media pipeline
//! 3. Success lands the derived columns and `ready` in one write
//! 4. Failure records `failed` plus an operator-readable message
//! 5. A re-upload resets the row to `pending` with a new source file

mod models;
mod schema;
mod store;

pub use models::{
    Collection, CollectionEdit, CollectionType, NewCollection, NewTrack, ProcessedTrack,
    ReuploadedTrack, Track, TrackCategory, TrackEdit, TrackStatus,
};
pub use schema::LIBRARY_SCHEMA_SQL;
pub use store::{LibraryStore, SqliteLibraryStore, StoreError};
