//! Track endpoints: listing, lookup, edits, batch admin actions and the
//! derived file serving (peaks, art). Audio streaming lives in
//! `stream_track`.

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::{info, warn};

use super::response::{error_response, store_error_response};
use super::state::{GuardedLibraryStore, ServerState};
use super::stream_track::stream_track;
use crate::library::{Track, TrackCategory, TrackEdit, TrackStatus};
use crate::pipeline::MediaLayout;
use crate::slug;

const SEARCH_LIMIT: usize = 10;

#[derive(Debug, Serialize)]
pub struct TrackDetail {
    #[serde(flatten)]
    pub track: Track,
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize)]
struct TrackStatusResponse {
    status: TrackStatus,
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    #[serde(default)]
    q: String,
    exclude: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpdateTrackBody {
    title: Option<String>,
    description: Option<String>,
    category: Option<TrackCategory>,
    slug: Option<String>,
    /// Comma-separated names, replaces the whole tag set.
    tags: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
enum BatchRequest {
    Delete {
        track_ids: Vec<String>,
    },
    SetCategory {
        track_ids: Vec<String>,
        category: TrackCategory,
    },
    AddTags {
        track_ids: Vec<String>,
        tags: String,
    },
}

#[derive(Debug, Serialize)]
struct BatchResponse {
    affected: usize,
}

fn parse_tag_names(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

/// GET /tracks - every track, newest first.
async fn list_tracks(State(store): State<GuardedLibraryStore>) -> Response {
    match store.list_tracks() {
        Ok(tracks) => Json(tracks).into_response(),
        Err(err) => store_error_response(err),
    }
}

/// GET /tracks/{id} - lookup by id, falling back to slug for public pages.
async fn get_track(State(store): State<GuardedLibraryStore>, Path(id): Path<String>) -> Response {
    let found = match store.get_track(&id) {
        Ok(Some(track)) => Some(track),
        Ok(None) => match store.get_track_by_slug(&id) {
            Ok(found) => found,
            Err(err) => return store_error_response(err),
        },
        Err(err) => return store_error_response(err),
    };

    let track = match found {
        Some(track) => track,
        None => return StatusCode::NOT_FOUND.into_response(),
    };
    let tags = match store.tags_for_track(&track.id) {
        Ok(tags) => tags,
        Err(err) => return store_error_response(err),
    };
    Json(TrackDetail { track, tags }).into_response()
}

/// GET /tracks/search?q= - ready tracks matching a title substring, used
/// by the collection membership picker. `exclude` drops current members.
async fn search_tracks(
    State(store): State<GuardedLibraryStore>,
    Query(query): Query<SearchQuery>,
) -> Response {
    let q = query.q.trim();
    if q.is_empty() {
        return Json(Vec::<Track>::new()).into_response();
    }

    let excluded: HashSet<String> = match &query.exclude {
        Some(collection_id) => match store.tracks_in_collection(collection_id) {
            Ok(tracks) => tracks.into_iter().map(|t| t.id).collect(),
            Err(err) => return store_error_response(err),
        },
        None => HashSet::new(),
    };

    match store.search_tracks(q, SEARCH_LIMIT) {
        Ok(tracks) => {
            let results: Vec<Track> = tracks
                .into_iter()
                .filter(|t| t.status == TrackStatus::Ready && !excluded.contains(&t.id))
                .collect();
            Json(results).into_response()
        }
        Err(err) => store_error_response(err),
    }
}

/// GET /tracks/{id}/status - polled by the upload page while processing.
async fn get_track_status(
    State(store): State<GuardedLibraryStore>,
    Path(id): Path<String>,
) -> Response {
    match store.get_track(&id) {
        Ok(Some(track)) => Json(TrackStatusResponse {
            status: track.status,
            error_message: track.error_message,
        })
        .into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => store_error_response(err),
    }
}

/// POST /tracks/{id}/play
async fn post_track_play(
    State(store): State<GuardedLibraryStore>,
    Path(id): Path<String>,
) -> Response {
    match store.increment_play_count(&id) {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => store_error_response(err),
    }
}

/// PATCH /tracks/{id} - merge the provided fields into the current row.
async fn patch_track(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateTrackBody>,
) -> Response {
    let track = match state.store.get_track(&id) {
        Ok(Some(track)) => track,
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => return store_error_response(err),
    };

    if body.title.is_none()
        && body.description.is_none()
        && body.category.is_none()
        && body.slug.is_none()
        && body.tags.is_none()
    {
        return error_response(StatusCode::BAD_REQUEST, "No fields to update");
    }

    let title = match body.title {
        Some(t) => {
            let t = t.trim().to_string();
            if t.is_empty() {
                return error_response(StatusCode::BAD_REQUEST, "Title cannot be empty");
            }
            t
        }
        None => track.title.clone(),
    };

    let slug_value = match body.slug {
        Some(s) => {
            let normalized = slug::slugify(&s);
            if normalized.is_empty() {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    "Slug must contain at least one alphanumeric character",
                );
            }
            match state.store.track_slug_taken_by_other(&normalized, &id) {
                Ok(true) => return error_response(StatusCode::CONFLICT, "Slug already in use"),
                Ok(false) => {}
                Err(err) => return store_error_response(err),
            }
            normalized
        }
        None => track.slug.clone(),
    };

    let edit = TrackEdit {
        title,
        description: body.description.or_else(|| track.description.clone()),
        category: body.category.unwrap_or(track.category),
        slug: slug_value,
    };
    match state.store.update_track(&id, &edit) {
        Ok(true) => {}
        Ok(false) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => return store_error_response(err),
    }

    if let Some(tags) = body.tags {
        if let Err(err) = state.store.set_track_tags(&id, &parse_tag_names(&tags)) {
            return store_error_response(err);
        }
    }

    let updated = match state.store.get_track(&id) {
        Ok(Some(track)) => track,
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => return store_error_response(err),
    };
    let tags = match state.store.tags_for_track(&id) {
        Ok(tags) => tags,
        Err(err) => return store_error_response(err),
    };
    Json(TrackDetail {
        track: updated,
        tags,
    })
    .into_response()
}

/// POST /tracks/batch - admin bulk actions.
async fn batch_tracks(State(state): State<ServerState>, Json(body): Json<BatchRequest>) -> Response {
    match body {
        BatchRequest::Delete { track_ids } => {
            if track_ids.is_empty() {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    "track_ids must be a non-empty array",
                );
            }

            // Capture parent collections before the membership rows cascade
            // away, then refresh their aggregates afterwards.
            let collection_ids = match state.store.collections_for_tracks(&track_ids) {
                Ok(ids) => ids,
                Err(err) => return store_error_response(err),
            };

            for track_id in &track_ids {
                if let Err(err) = state.layout.remove_track_files(track_id) {
                    warn!("Could not remove files for track {}: {}", track_id, err);
                }
            }

            let deleted = match state.store.delete_tracks(&track_ids) {
                Ok(n) => n,
                Err(err) => return store_error_response(err),
            };

            for collection_id in &collection_ids {
                if let Err(err) = state.store.recalc_collection_aggregates(collection_id) {
                    warn!(
                        "Aggregate recalculation failed for collection {}: {}",
                        collection_id, err
                    );
                }
            }

            info!(
                "Deleted {} tracks, refreshed {} collections",
                deleted,
                collection_ids.len()
            );
            Json(BatchResponse { affected: deleted }).into_response()
        }
        BatchRequest::SetCategory {
            track_ids,
            category,
        } => {
            if track_ids.is_empty() {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    "track_ids must be a non-empty array",
                );
            }
            match state.store.set_tracks_category(&track_ids, category) {
                Ok(affected) => Json(BatchResponse { affected }).into_response(),
                Err(err) => store_error_response(err),
            }
        }
        BatchRequest::AddTags { track_ids, tags } => {
            if track_ids.is_empty() {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    "track_ids must be a non-empty array",
                );
            }
            let names = parse_tag_names(&tags);
            if names.is_empty() {
                return error_response(StatusCode::BAD_REQUEST, "No tags provided");
            }
            match state.store.add_tags_to_tracks(&track_ids, &names) {
                Ok(()) => Json(BatchResponse {
                    affected: track_ids.len(),
                })
                .into_response(),
                Err(err) => store_error_response(err),
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct PeaksFile {
    data: Vec<f64>,
}

/// GET /tracks/{id}/peaks - waveform peaks normalized to [-1, 1].
async fn get_track_peaks(
    State(store): State<GuardedLibraryStore>,
    State(layout): State<MediaLayout>,
    Path(id): Path<String>,
) -> Response {
    let track = match store.get_track(&id) {
        Ok(Some(track)) => track,
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => return store_error_response(err),
    };
    let path = match track.peaks_path {
        Some(path) => PathBuf::from(path),
        None => return StatusCode::NOT_FOUND.into_response(),
    };
    if !layout.contains(&path) {
        return StatusCode::NOT_FOUND.into_response();
    }

    let raw = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(_) => return StatusCode::NOT_FOUND.into_response(),
    };
    let parsed: PeaksFile = match serde_json::from_slice(&raw) {
        Ok(parsed) => parsed,
        Err(_) => return StatusCode::NOT_FOUND.into_response(),
    };

    let normalized: Vec<f64> = parsed.data.iter().map(|v| v / 127.0).collect();
    (
        [(
            header::CACHE_CONTROL,
            "public, max-age=31536000, immutable",
        )],
        Json(normalized),
    )
        .into_response()
}

/// GET /tracks/{id}/art - the resized cover, always jpeg.
async fn get_track_art(
    State(store): State<GuardedLibraryStore>,
    State(layout): State<MediaLayout>,
    Path(id): Path<String>,
) -> Response {
    let track = match store.get_track(&id) {
        Ok(Some(track)) => track,
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => return store_error_response(err),
    };
    let path = match track.art_path {
        Some(path) => PathBuf::from(path),
        None => return StatusCode::NOT_FOUND.into_response(),
    };
    if !layout.contains(&path) {
        return StatusCode::NOT_FOUND.into_response();
    }

    match tokio::fs::read(&path).await {
        Ok(bytes) => Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, "image/jpeg")
            .header(header::CACHE_CONTROL, "public, max-age=31536000, immutable")
            .body(bytes.into())
            .unwrap(),
        Err(_) => StatusCode::NOT_FOUND.into_response(),
    }
}

/// Build the track routes.
pub fn track_routes() -> Router<ServerState> {
    Router::new()
        .route("/tracks", get(list_tracks))
        .route("/tracks/batch", post(batch_tracks))
        .route("/tracks/search", get(search_tracks))
        .route("/tracks/{id}", get(get_track).patch(patch_track))
        .route("/tracks/{id}/status", get(get_track_status))
        .route("/tracks/{id}/play", post(post_track_play))
        .route("/tracks/{id}/audio", get(stream_track))
        .route("/tracks/{id}/peaks", get(get_track_peaks))
        .route("/tracks/{id}/art", get(get_track_art))
}
