//! Shared response shapes for the API routes.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use crate::library::StoreError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

pub fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Map a store failure to a response. Slug conflicts become 409 so the
/// client can re-prompt, anything else is a plain 500.
pub fn store_error_response(err: StoreError) -> Response {
    if err.is_slug_conflict() {
        return error_response(StatusCode::CONFLICT, "Slug already in use");
    }
    error!("Library store error: {}", err);
    StatusCode::INTERNAL_SERVER_ERROR.into_response()
}
