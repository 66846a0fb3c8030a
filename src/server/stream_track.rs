//! Audio streaming with byte-range support.

use super::state::{GuardedLibraryStore, ServerState};
use crate::library::TrackStatus;
use crate::pipeline::MediaLayout;
use axum::{
    body::Body,
    extract::{FromRequestParts, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::path::PathBuf;

use tokio::{
    fs::File,
    io::{AsyncSeekExt, BufReader, SeekFrom},
};
use tokio_util::io::ReaderStream;
use tracing::debug;

const HEADER_BYTE_RANGE: &str = "Range";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    start_inclusive: Option<u64>,
    end_inclusive: Option<u64>,
}

impl ByteRange {
    pub fn new(start_inclusive: Option<u64>, end_inclusive: Option<u64>) -> ByteRange {
        ByteRange {
            start_inclusive,
            end_inclusive,
        }
    }

    fn parse<S: AsRef<str>>(s: S) -> Option<ByteRange> {
        let v = s.as_ref();
        if !v.starts_with("bytes=") {
            return None;
        }

        let v = &v[6..];
        let parts: Vec<&str> = v.split('-').collect();
        if parts.len() != 2 {
            return None;
        }

        Some(ByteRange {
            start_inclusive: parts[0].parse::<u64>().ok(),
            end_inclusive: parts[1].parse::<u64>().ok(),
        })
    }
}

pub struct ByteRangeExtractionError {}

impl IntoResponse for ByteRangeExtractionError {
    fn into_response(self) -> Response {
        StatusCode::BAD_REQUEST.into_response()
    }
}

impl FromRequestParts<ServerState> for Option<ByteRange> {
    type Rejection = ByteRangeExtractionError;

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        Ok(parts
            .headers
            .get(HEADER_BYTE_RANGE)
            .map(|x| x.to_str())
            .map(|x| x.ok())
            .and_then(|x| x.and_then(ByteRange::parse)))
    }
}

pub async fn stream_track(
    byte_range: Option<ByteRange>,
    State(store): State<GuardedLibraryStore>,
    State(layout): State<MediaLayout>,
    Path(id): Path<String>,
) -> Response {
    let track = match store.get_track(&id) {
        Ok(Some(track)) => track,
        Ok(None) => return StatusCode::NOT_FOUND.into_response(),
        Err(_) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    };

    // Only ready tracks have a transcoded MP3 behind audio_path.
    if track.status != TrackStatus::Ready {
        return StatusCode::NOT_FOUND.into_response();
    }

    let path = PathBuf::from(&track.audio_path);
    if !layout.contains(&path) {
        debug!("Track {} audio path escapes the data dir", id);
        return StatusCode::NOT_FOUND.into_response();
    }

    debug!("Streaming track {} from {}", id, path.display());

    let mut file = match File::open(&path).await {
        Err(_) => return StatusCode::NOT_FOUND.into_response(),
        Ok(x) => x,
    };

    let file_length = match file.metadata().await {
        Ok(x) => x.len(),
        Err(_) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    };

    let mut start_served = 0;
    if let Some(start) = byte_range.and_then(|x| x.start_inclusive) {
        if start >= file_length {
            return StatusCode::RANGE_NOT_SATISFIABLE.into_response();
        }
        if file.seek(SeekFrom::Start(start)).await.is_err() {
            return StatusCode::BAD_REQUEST.into_response();
        }
        start_served = start;
    }

    let chunk_size = match byte_range {
        None => file_length,
        Some(ByteRange {
            start_inclusive: None,
            end_inclusive: None,
        }) => file_length,
        Some(ByteRange {
            start_inclusive: None,
            end_inclusive: Some(end),
        }) => end.min(file_length),
        Some(ByteRange {
            start_inclusive: Some(start),
            end_inclusive: None,
        }) => file_length - start,
        Some(ByteRange {
            start_inclusive: Some(start),
            end_inclusive: Some(end),
        }) => end.min(file_length - 1) - start + 1,
    };
    let status_code = match byte_range {
        None
        | Some(ByteRange {
            start_inclusive: None,
            end_inclusive: None,
        }) => StatusCode::OK,
        _ => StatusCode::PARTIAL_CONTENT,
    };

    let file_reader = BufReader::with_capacity(4096 * 16, file);
    let stream = ReaderStream::with_capacity(file_reader, 4096 * 16);

    let body = Body::from_stream(stream);

    let mut builder = Response::builder()
        .status(status_code)
        .header("Content-Type", "audio/mpeg")
        .header("Accept-Ranges", "bytes")
        .header("Cache-Control", "public, max-age=31536000, immutable")
        .header("Content-length", chunk_size);
    if status_code == StatusCode::PARTIAL_CONTENT {
        builder = builder.header(
            "Content-Range",
            format!(
                "bytes {}-{}/{}",
                start_served,
                (start_served + chunk_size).saturating_sub(1),
                file_length
            ),
        );
    }
    builder.body(body).unwrap()
}
