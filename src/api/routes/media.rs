//! Stored media handler.

use crate::api::AppState;
use crate::error::Error;
use crate::fetcher::DEFAULT_MIME_TYPE;
use crate::storage::validate_path;
use axum::{
    extract::State,
    http::{StatusCode, Uri, header},
    response::{IntoResponse, Response},
};

/// GET /media/*path - Serve an archived media object
///
/// Only objects under the media prefix are served; scratch objects are not
/// reachable. The router mounts this handler at the configured media prefix.
///
/// The object path is the request path as sent, so percent-encoded owner
/// segments match the stored keys.
#[utoipa::path(
    get,
    path = "/media/{path}",
    tag = "media",
    params(
        ("path" = String, Path, description = "Object path below the media prefix")
    ),
    responses(
        (status = 200, description = "Object content with its stored content type"),
        (status = 400, description = "Malformed object path", body = crate::error::ApiError),
        (status = 404, description = "Object not found", body = crate::error::ApiError)
    )
)]
pub async fn serve_media(State(state): State<AppState>, uri: Uri) -> Response {
    let path = uri.path().trim_start_matches('/').to_string();
    if let Err(e) = validate_path(&path) {
        return e.into_response();
    }

    let store = state.archiver.store();
    let meta = match store.stat(&path).await {
        Ok(Some(meta)) => meta,
        Ok(None) => return Error::NotFound(format!("object {}", path)).into_response(),
        Err(e) => return e.into_response(),
    };

    match store.read(&path).await {
        Ok(data) => {
            let content_type = meta
                .content_type
                .unwrap_or_else(|| DEFAULT_MIME_TYPE.to_string());
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, content_type),
                    (header::CONTENT_LENGTH, data.len().to_string()),
                ],
                data,
            )
                .into_response()
        }
        Err(e) => {
            tracing::warn!(path = %path, error = %e, "Failed to read media object");
            e.into_response()
        }
    }
}
