//! Upload endpoints: new tracks and source replacement.
//!
//! Validation is strictly before persistence. A rejected upload leaves no
//! database row and no file on disk.

use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::response::{error_response, store_error_response};
use super::state::ServerState;
use crate::library::{NewTrack, ReuploadedTrack, TrackStatus};
use crate::media::validate_audio_upload;
use crate::slug::{self, SlugError};

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub track_id: String,
    pub slug: String,
    pub status: TrackStatus,
}

/// Pull the `audio` field out of a multipart body. Later fields with the
/// same name win, matching browser form behavior.
async fn read_audio_field(mut multipart: Multipart) -> Result<(Option<String>, Vec<u8>), Response> {
    let mut filename: Option<String> = None;
    let mut data: Option<Vec<u8>> = None;

    while let Ok(Some(field)) = multipart.next_field().await {
        match field.name().unwrap_or("") {
            "audio" => {
                filename = field.file_name().map(|s| s.to_string());
                match field.bytes().await {
                    Ok(bytes) => data = Some(bytes.to_vec()),
                    Err(e) => {
                        warn!("Failed to read upload data: {}", e);
                        return Err(error_response(
                            StatusCode::BAD_REQUEST,
                            "Failed to read file",
                        ));
                    }
                }
            }
            _ => {}
        }
    }

    match data {
        Some(d) if !d.is_empty() => Ok((filename, d)),
        _ => Err(error_response(StatusCode::BAD_REQUEST, "Audio file required")),
    }
}

fn file_stem(filename: &str) -> String {
    std::path::Path::new(filename)
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

fn file_extension(filename: &str) -> Option<String> {
    std::path::Path::new(filename)
        .extension()
        .map(|s| s.to_string_lossy().to_string())
}

/// POST /upload - accept a new audio file and queue it for processing.
async fn upload_track(State(state): State<ServerState>, multipart: Multipart) -> Response {
    let (filename, data) = match read_audio_field(multipart).await {
        Ok(x) => x,
        Err(response) => return response,
    };

    if let Err(err) = validate_audio_upload(&data, state.config.max_audio_bytes) {
        return error_response(StatusCode::BAD_REQUEST, err.to_string());
    }

    let track_id = Uuid::new_v4().to_string();
    let filename = filename.unwrap_or_default();
    let stem = file_stem(&filename);
    let extension = file_extension(&filename);

    let slug = match slug::allocate(&stem, &track_id, |candidate| {
        state.store.track_slug_taken(candidate)
    }) {
        Ok(slug) => slug,
        Err(SlugError::Exhausted { .. }) => {
            return error_response(StatusCode::CONFLICT, "No free slug for this filename");
        }
        Err(SlugError::Check(err)) => return store_error_response(err),
    };

    let saved = match state
        .layout
        .save_original(&track_id, extension.as_deref(), &data)
    {
        Ok(path) => path,
        Err(err) => {
            error!("Failed to save upload for track {}: {}", track_id, err);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let title = if stem.is_empty() {
        track_id.clone()
    } else {
        stem.clone()
    };
    let new_track = NewTrack {
        id: track_id.clone(),
        slug: slug.clone(),
        title,
        original_filename: filename,
        audio_path: saved.to_string_lossy().to_string(),
        file_size: data.len() as i64,
    };
    if let Err(err) = state.store.insert_track(&new_track) {
        return store_error_response(err);
    }

    state.scheduler.enqueue();
    info!("Track {} uploaded as '{}', queued for processing", track_id, slug);

    (
        StatusCode::CREATED,
        Json(UploadResponse {
            track_id,
            slug,
            status: TrackStatus::Pending,
        }),
    )
        .into_response()
}

/// POST /tracks/{id}/reupload - replace a track's source file and run the
/// pipeline again. The slug, play count and memberships survive.
async fn reupload_track(
    State(state): State<ServerState>,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Response {
    let track = match state.store.get_track(&id) {
        Ok(Some(track)) => track,
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => return store_error_response(err),
    };

    let (filename, data) = match read_audio_field(multipart).await {
        Ok(x) => x,
        Err(response) => return response,
    };

    if let Err(err) = validate_audio_upload(&data, state.config.max_audio_bytes) {
        return error_response(StatusCode::BAD_REQUEST, err.to_string());
    }

    // The replacement may carry a different extension, so clear out old
    // originals instead of overwriting in place.
    if let Err(err) = state.layout.remove_originals(&id) {
        warn!("Could not remove old originals for track {}: {}", id, err);
    }

    let filename = filename.unwrap_or_default();
    let extension = file_extension(&filename);
    let saved = match state.layout.save_original(&id, extension.as_deref(), &data) {
        Ok(path) => path,
        Err(err) => {
            error!("Failed to save replacement for track {}: {}", id, err);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let upload = ReuploadedTrack {
        original_filename: filename,
        audio_path: saved.to_string_lossy().to_string(),
        file_size: data.len() as i64,
    };
    match state.store.reset_track_for_reupload(&id, &upload) {
        Ok(true) => {}
        Ok(false) => return StatusCode::NOT_FOUND.into_response(),
        Err(err) => return store_error_response(err),
    }

    state.scheduler.enqueue();
    info!("Track {} source replaced, queued for reprocessing", id);

    Json(UploadResponse {
        track_id: id,
        slug: track.slug,
        status: TrackStatus::Pending,
    })
    .into_response()
}

/// Build the upload routes.
pub fn upload_routes(max_audio_bytes: u64) -> Router<ServerState> {
    // Body limit sits above the audio cap so multipart framing does not
    // trip it first; the real cap is enforced by content validation.
    let body_limit = (max_audio_bytes as usize).saturating_add(10 * 1024 * 1024);

    Router::new()
        .route("/upload", post(upload_track))
        .route("/tracks/{id}/reupload", post(reupload_track))
        .layer(DefaultBodyLimit::max(body_limit))
}
