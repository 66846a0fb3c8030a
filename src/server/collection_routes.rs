//! Collection endpoints: CRUD, manual ordering, membership and art.

use axum::extract::{Multipart, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, patch, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::response::{error_response, store_error_response};
use super::state::{GuardedLibraryStore, ServerState};
use crate::library::{Collection, CollectionEdit, CollectionType, NewCollection, Track};
use crate::media::validate_image_upload;
use crate::pipeline::{remove_file_if_exists, MediaLayout};
use crate::slug::{self, SlugError};

#[derive(Debug, Deserialize)]
struct CreateCollectionBody {
    title: String,
    description: Option<String>,
    #[serde(rename = "type")]
    collection_type: CollectionType,
    artist: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateCollectionResponse {
    collection_id: String,
    slug: String,
}

#[derive(Debug, Serialize)]
pub struct CollectionDetail {
    #[serde(flatten)]
    pub collection: Collection,
    pub tracks: Vec<Track>,
}

#[derive(Debug, Deserialize)]
struct UpdateCollectionBody {
    title: Option<String>,
    description: Option<String>,
    artist: Option<String>,
    slug: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReorderCollectionsBody {
    /// Collection ids in display order; index becomes `sort_order`.
    ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct AddTrackBody {
    track_id: String,
    position: Option<i64>,
}

#[derive(Debug, Serialize)]
struct AddTrackResponse {
    position: i64,
}

#[derive(Debug, Deserialize)]
struct TrackPosition {
    track_id: String,
    position: i64,
}

#[derive(Debug, Deserialize)]
struct ReorderTracksBody {
    positions: Vec<TrackPosition>,
}

#[derive(Debug, Serialize)]
struct CollectionArtResponse {
    art_path: String,
    dominant_color: Option<String>,
}

fn trimmed_or_none(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// POST /collections
async fn create_collection(
    State(state): State<ServerState>,
    Json(body): Json<CreateCollectionBody>,
) -> Response {
    let title = body.title.trim().to_string();
    if title.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "Title is required");
    }

    let collection_id = Uuid::new_v4().to_string();
    let slug = match slug::allocate(&title, &collection_id, |candidate| {
        state.store.collection_slug_taken(candidate)
    }) {
        Ok(slug) => slug,
        Err(SlugError::Exhausted { .. }) => {
            return error_response(StatusCode::CONFLICT, "No free slug for this title");
        }
        Err(SlugError::Check(err)) => return store_error_response(err),
    };

    // Artist is an album-level notion, playlists and singles ignore it.
    let artist = if body.collection_type == CollectionType::Album {
        trimmed_or_none(body.artist)
    } else {
        None
    };

    let collection = NewCollection {
        id: collection_id.clone(),
        slug: slug.clone(),
        title,
        description: trimmed_or_none(body.description),
        collection_type: body.collection_type,
        artist,
        art_path: None,
        dominant_color: None,
    };
    if let Err(err) = state.store.insert_collection(&collection) {
        return store_error_response(err);
    }

    info!("Created {} collection {}", collection.collection_type.as_str(), collection_id);
    (
        StatusCode::CREATED,
        Json(CreateCollectionResponse {
            collection_id,
            slug,
        }),
    )
        .into_response()
}

/// GET /collections - ordered by sort_order.
async fn list_collections(State(store): State<GuardedLibraryStore>) -> Response {
    match store.list_collections() {
        Ok(collections) => Json(collections).into_response(),
        Err(err) => store_error_response(err),
    }
}

/// GET /collections/{id} - id or slug, with members in position order.
async fn get_collection(
    State(store): State<GuardedLibraryStore>,
    Path(id): Path<String>,
) -> Response {
    let found = match store.get_collection(&id) {
        Ok(Some(collection)) => Some(collection),
        Ok(None) => match store.get_collection_by_slug(&id) {
            Ok(found) => found,
            Err(err) => return store_error_response(err),
        },
        Err(err) => return store_error_response(err),
    };

    let collection = match found {
        Some(collection) => collection,
        None => return StatusCode::NOT_FOUND.into_response(),
    };
    let tracks = match store.tracks_in_collection(&collection.id) {
        Ok(tracks) => tracks,
        Err(err) => return store_error_response(err),
    };
    Json(CollectionDetail { collection, tracks }).into_response()
}

/// PATCH /collections/{id}
async fn patch_collection(
    State(store): State<GuardedLibraryStore>,
    Path(id): Path<String>,
    Json(body): Json<UpdateCollectionBody>,
) -> Response {
    let collection = match store.get_collection(&id) {
        Ok(Some(collection)) => collection,
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => return store_error_response(err),
    };

    if body.title.is_none()
        && body.description.is_none()
        && body.artist.is_none()
        && body.slug.is_none()
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
        None => collection.title.clone(),
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
            match store.collection_slug_taken_by_other(&normalized, &id) {
                Ok(true) => return error_response(StatusCode::CONFLICT, "Slug already in use"),
                Ok(false) => {}
                Err(err) => return store_error_response(err),
            }
            normalized
        }
        None => collection.slug.clone(),
    };

    let edit = CollectionEdit {
        title,
        description: match body.description {
            Some(d) => trimmed_or_none(Some(d)),
            None => collection.description.clone(),
        },
        artist: match body.artist {
            Some(a) => trimmed_or_none(Some(a)),
            None => collection.artist.clone(),
        },
        slug: slug_value,
    };
    match store.update_collection(&id, &edit) {
        Ok(true) => {}
        Ok(false) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => return store_error_response(err),
    }

    match store.get_collection(&id) {
        Ok(Some(updated)) => Json(updated).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => store_error_response(err),
    }
}

/// DELETE /collections/{id} - memberships cascade, tracks survive.
async fn delete_collection(State(state): State<ServerState>, Path(id): Path<String>) -> Response {
    let collection = match state.store.get_collection(&id) {
        Ok(Some(collection)) => collection,
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => return store_error_response(err),
    };

    match state.store.delete_collection(&id) {
        Ok(true) => {}
        Ok(false) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => return store_error_response(err),
    }

    if let Some(art) = &collection.art_path {
        if let Err(err) = remove_file_if_exists(std::path::Path::new(art)) {
            warn!("Failed to remove art of collection {}: {}", id, err);
        }
    }

    info!("Deleted collection {}", id);
    StatusCode::NO_CONTENT.into_response()
}

/// PATCH /collections/reorder
async fn reorder_collections(
    State(store): State<GuardedLibraryStore>,
    Json(body): Json<ReorderCollectionsBody>,
) -> Response {
    if body.ids.is_empty() {
        return error_response(StatusCode::BAD_REQUEST, "ids must be a non-empty array");
    }
    match store.set_collections_order(&body.ids) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => store_error_response(err),
    }
}

/// POST /collections/{id}/tracks - add a member. Joining a real collection
/// retires any auto-created single wrapper of the track.
async fn add_collection_track(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    Json(body): Json<AddTrackBody>,
) -> Response {
    let collection = match state.store.get_collection(&id) {
        Ok(Some(collection)) => collection,
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => return store_error_response(err),
    };
    match state.store.get_track(&body.track_id) {
        Ok(Some(_)) => {}
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => return store_error_response(err),
    }

    let position = match state
        .store
        .add_track_to_collection(&id, &body.track_id, body.position)
    {
        Ok(position) => position,
        Err(err) => return store_error_response(err),
    };

    if collection.collection_type != CollectionType::Single {
        if let Err(err) = state.grouping.retire_singles_for_track(&body.track_id, &id) {
            warn!("Failed to retire singles for track {}: {}", body.track_id, err);
        }
    }

    if let Err(err) = state.store.recalc_collection_aggregates(&id) {
        return store_error_response(err);
    }

    (StatusCode::CREATED, Json(AddTrackResponse { position })).into_response()
}

/// DELETE /collections/{id}/tracks/{track_id} - idempotent removal.
async fn remove_collection_track(
    State(store): State<GuardedLibraryStore>,
    Path((id, track_id)): Path<(String, String)>,
) -> Response {
    match store.get_collection(&id) {
        Ok(Some(_)) => {}
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => return store_error_response(err),
    }

    if let Err(err) = store.remove_track_from_collection(&id, &track_id) {
        return store_error_response(err);
    }
    if let Err(err) = store.recalc_collection_aggregates(&id) {
        return store_error_response(err);
    }
    StatusCode::NO_CONTENT.into_response()
}

/// PATCH /collections/{id}/tracks/reorder
async fn reorder_collection_tracks(
    State(store): State<GuardedLibraryStore>,
    Path(id): Path<String>,
    Json(body): Json<ReorderTracksBody>,
) -> Response {
    match store.get_collection(&id) {
        Ok(Some(_)) => {}
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => return store_error_response(err),
    }

    let positions: Vec<(String, i64)> = body
        .positions
        .into_iter()
        .map(|p| (p.track_id, p.position))
        .collect();
    match store.set_track_positions(&id, &positions) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => store_error_response(err),
    }
}

/// GET /collections/{id}/art
async fn get_collection_art(
    State(store): State<GuardedLibraryStore>,
    State(layout): State<MediaLayout>,
    Path(id): Path<String>,
) -> Response {
    let collection = match store.get_collection(&id) {
        Ok(Some(collection)) => collection,
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => return store_error_response(err),
    };
    let path = match collection.art_path {
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

/// POST /collections/{id}/art - multipart `art` field, resized in place.
async fn post_collection_art(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    mut multipart: Multipart,
) -> Response {
    match state.store.get_collection(&id) {
        Ok(Some(_)) => {}
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => return store_error_response(err),
    }

    let mut data: Option<Vec<u8>> = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        if field.name().unwrap_or("") == "art" {
            match field.bytes().await {
                Ok(bytes) => data = Some(bytes.to_vec()),
                Err(e) => {
                    warn!("Failed to read art upload: {}", e);
                    return error_response(StatusCode::BAD_REQUEST, "Failed to read file");
                }
            }
        }
    }
    let data = match data {
        Some(d) if !d.is_empty() => d,
        _ => return error_response(StatusCode::BAD_REQUEST, "Art file required"),
    };

    if let Err(err) = validate_image_upload(&data, state.config.max_image_bytes) {
        return error_response(StatusCode::BAD_REQUEST, err.to_string());
    }

    let destination = state.layout.collection_art_path(&id);
    if let Err(err) = state.tools.resize_art(&data, &destination).await {
        error!("Art processing failed for collection {}: {}", id, err);
        return error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string());
    }

    let dominant_color = match state.tools.dominant_color(&destination).await {
        Ok(color) => Some(color),
        Err(err) => {
            warn!("Color extraction failed for collection {}: {}", id, err);
            None
        }
    };

    let art_path = destination.to_string_lossy().to_string();
    match state
        .store
        .set_collection_art(&id, &art_path, dominant_color.as_deref())
    {
        Ok(true) => Json(CollectionArtResponse {
            art_path,
            dominant_color,
        })
        .into_response(),
        Ok(false) => StatusCode::NOT_FOUND.into_response(),
        Err(err) => store_error_response(err),
    }
}

/// Build the collection routes.
pub fn collection_routes() -> Router<ServerState> {
    Router::new()
        .route("/collections", post(create_collection).get(list_collections))
        .route("/collections/reorder", patch(reorder_collections))
        .route(
            "/collections/{id}",
            get(get_collection)
                .patch(patch_collection)
                .delete(delete_collection),
        )
        .route(
            "/collections/{id}/tracks",
            post(add_collection_track),
        )
        .route(
            "/collections/{id}/tracks/reorder",
            patch(reorder_collection_tracks),
        )
        .route(
            "/collections/{id}/tracks/{track_id}",
            delete(remove_collection_track),
        )
        .route(
            "/collections/{id}/art",
            get(get_collection_art).post(post_collection_art),
        )
}
