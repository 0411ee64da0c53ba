use axum::{
    extract::{Path, Query, State},
    http::header,
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use bytes::Bytes;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::{
    error::{AppError, AppResult},
    middleware::AuthedUser,
    state::AppState,
};

pub fn routes() -> Router<AppState> {
    Router::new().route("/media", post(upload))
}

#[derive(Debug, Default, Deserialize)]
struct UploadParams {
    file_name: Option<String>,
}

/// Persist an uploaded blob; the returned URL is the attachment reference
/// that media/sticker message payloads carry.
async fn upload(
    State(state): State<AppState>,
    AuthedUser(_user_id): AuthedUser,
    Query(params): Query<UploadParams>,
    body: Bytes,
) -> AppResult<Json<Value>> {
    if body.is_empty() {
        return Err(AppError::BadRequest("upload body is empty".into()));
    }

    let url = state
        .storage
        .store(params.file_name.as_deref().unwrap_or(""), body)
        .await?;

    Ok(Json(json!({ "url": url })))
}

/// Serve a stored blob back out. Unauthenticated: the URLs are unguessable
/// (uuid-prefixed) and embedded in message payloads.
pub async fn serve_media(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
) -> AppResult<Response> {
    // The store only writes flat sanitized names; anything that tries to
    // traverse out of the media root cannot exist.
    if file_name.contains('/') || file_name.contains('\\') || file_name.contains("..") {
        return Err(AppError::NotFound("Media not found".into()));
    }

    let path = std::path::Path::new(&state.config.media_root).join(&file_name);
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|_| AppError::NotFound("Media not found".into()))?;

    Ok((
        [(header::CONTENT_TYPE, "application/octet-stream")],
        bytes,
    )
        .into_response())
}
