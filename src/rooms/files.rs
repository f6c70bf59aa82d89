//! Direct file snapshot access, outside any live session.
//!
//! These read and write the durable store only; a running session's
//! in-memory documents are untouched and will overwrite the row at its
//! next eligible save.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};

use crate::auth::middleware::Claims;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct FileContentResponse {
    pub content: String,
}

/// GET /api/files/{room_id}/{*path} — Fetch one file's durable content.
pub async fn get_file(
    State(state): State<AppState>,
    _claims: Claims,
    Path((room_id, path)): Path<(String, String)>,
) -> Result<Json<FileContentResponse>, StatusCode> {
    let content = state
        .store
        .get_file(&room_id, &path)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to fetch file");
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(FileContentResponse { content }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateFileRequest {
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct UpdateFileResponse {
    pub success: bool,
}

/// POST /api/files/{room_id}/{*path} — Update an existing file's content.
pub async fn update_file(
    State(state): State<AppState>,
    _claims: Claims,
    Path((room_id, path)): Path<(String, String)>,
    Json(body): Json<UpdateFileRequest>,
) -> Result<Json<UpdateFileResponse>, StatusCode> {
    let found = state
        .store
        .update_file(&room_id, &path, body.content)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to update file");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    if !found {
        return Err(StatusCode::NOT_FOUND);
    }

    Ok(Json(UpdateFileResponse { success: true }))
}
