//! Thin room CRUD endpoints. Room creation is a separate flow from the
//! realtime core: a session only ever hydrates from rooms created here.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;

use crate::auth::middleware::Claims;
use crate::state::AppState;
use crate::store::{NewRoom, RoomRecord};

#[derive(Debug, Deserialize)]
pub struct CreateRoomRequest {
    pub name: String,
    #[serde(default)]
    pub repo: Option<String>,
    #[serde(default)]
    pub github_username: Option<String>,
}

/// POST /api/rooms — Create a room that expires after the configured TTL.
pub async fn create_room(
    State(state): State<AppState>,
    claims: Claims,
    Json(body): Json<CreateRoomRequest>,
) -> Result<(StatusCode, Json<RoomRecord>), StatusCode> {
    if body.name.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let room = state
        .store
        .create_room(NewRoom {
            name: body.name,
            repo: body.repo,
            created_by: claims.username,
            github_username: body.github_username,
            ttl: state.room_ttl,
        })
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to create room");
            StatusCode::INTERNAL_SERVER_ERROR
        })?;

    Ok((StatusCode::CREATED, Json(room)))
}

/// GET /api/rooms/{id} — Fetch room details with file snapshots.
pub async fn get_room(
    State(state): State<AppState>,
    _claims: Claims,
    Path(room_id): Path<String>,
) -> Result<Json<RoomRecord>, StatusCode> {
    let room = state
        .store
        .find_room(&room_id)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "Failed to fetch room");
            StatusCode::INTERNAL_SERVER_ERROR
        })?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(room))
}
