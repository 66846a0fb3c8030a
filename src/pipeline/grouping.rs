//! Auto-grouping of ungrouped tracks into `single` collections.
//!
//! Every finished track should belong to at least one collection so the
//! library UI has a grouping context. A track with no memberships gets a
//! one-track `single` collection mirroring its title and art. The wrapper
//! is retired again as soon as the track joins a real collection.

use super::layout::{remove_file_if_exists, MediaLayout};
use crate::library::{CollectionType, LibraryStore, NewCollection, StoreError, Track};
use crate::slug::{self, SlugError};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum GroupingError {
    #[error("slug allocation failed: {0}")]
    Slug(#[from] SlugError<StoreError>),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

pub struct GroupingManager {
    store: Arc<dyn LibraryStore>,
    layout: MediaLayout,
}

impl GroupingManager {
    pub fn new(store: Arc<dyn LibraryStore>, layout: MediaLayout) -> Self {
        Self { store, layout }
    }

    /// Wrap an ungrouped track in a new `single` collection: slug derived
    /// from the track's slug, title mirrored, track linked at position 0,
    /// aggregates set to the one member. Returns the new collection id,
    /// or `None` when the track already has a collection.
    pub fn ensure_single_for_track(&self, track: &Track) -> Result<Option<String>, GroupingError> {
        if !self.store.collections_for_track(&track.id)?.is_empty() {
            return Ok(None);
        }

        let collection_id = uuid::Uuid::new_v4().to_string();
        let slug = slug::allocate(&track.slug, &collection_id, |candidate| {
            self.store.collection_slug_taken(candidate)
        })?;

        // Copy the track art so the wrapper keeps its cover even if the
        // track art is later replaced. Art is enhancement, a failed copy
        // does not block grouping.
        let art_path = track.art_path.as_ref().and_then(|track_art| {
            let destination = self.layout.collection_art_path(&collection_id);
            match std::fs::copy(track_art, &destination) {
                Ok(_) => Some(destination.to_string_lossy().to_string()),
                Err(err) => {
                    warn!(
                        "Failed to copy art for single collection of track {}: {}",
                        track.id, err
                    );
                    None
                }
            }
        });

        let collection = NewCollection {
            id: collection_id.clone(),
            slug,
            title: track.title.clone(),
            description: None,
            collection_type: CollectionType::Single,
            artist: None,
            art_path,
            dominant_color: track.dominant_color.clone(),
        };
        self.store.insert_collection(&collection)?;
        self.store
            .add_track_to_collection(&collection_id, &track.id, Some(0))?;
        self.store.recalc_collection_aggregates(&collection_id)?;

        info!(
            "Created single collection {} for ungrouped track {}",
            collection_id, track.id
        );
        Ok(Some(collection_id))
    }

    /// Delete `single` wrappers that exist solely for this track, now that
    /// it joined a real collection. The wrapper's copied art file goes with
    /// it. Running this when no wrapper exists is a no-op.
    pub fn retire_singles_for_track(
        &self,
        track_id: &str,
        joined_collection_id: &str,
    ) -> Result<usize, GroupingError> {
        let singles = self
            .store
            .single_collections_for_track(track_id, Some(joined_collection_id))?;

        let mut retired = 0;
        for single in singles {
            // only wrappers holding exactly this one track qualify
            let members = self.store.tracks_in_collection(&single.id)?;
            if members.len() != 1 || members[0].id != track_id {
                continue;
            }

            if let Some(art) = &single.art_path {
                if let Err(err) = remove_file_if_exists(Path::new(art)) {
                    warn!("Failed to remove art of single collection {}: {}", single.id, err);
                }
            }
            if self.store.delete_collection(&single.id)? {
                info!(
                    "Retired single collection {} after track {} joined {}",
                    single.id, track_id, joined_collection_id
                );
                retired += 1;
            }
        }
        Ok(retired)
    }
}
