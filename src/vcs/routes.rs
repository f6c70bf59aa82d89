//! Commit and pull-request endpoints.
//!
//! The GitHub access token is supplied per request by the caller — the
//! server's own JWT authenticates the user but carries no VCS credential.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth::middleware::Claims;
use crate::state::AppState;
use crate::vcs::github::CommitFile;

#[derive(Debug, Deserialize)]
pub struct CommitRequest {
    pub files: Vec<CommitFile>,
    pub message: String,
    /// GitHub access token of the committing user
    pub token: String,
    #[serde(default = "default_branch")]
    pub branch: String,
}

fn default_branch() -> String {
    "main".to_string()
}

#[derive(Debug, Serialize)]
pub struct CommitResponse {
    pub success: bool,
    pub branch: String,
}

/// POST /api/rooms/{id}/commit — Commit the given files to the room's repository.
pub async fn commit_files(
    State(state): State<AppState>,
    _claims: Claims,
    Path(room_id): Path<String>,
    Json(body): Json<CommitRequest>,
) -> Result<Json<CommitResponse>, (StatusCode, Json<Value>)> {
    let room = state
        .store
        .find_room(&room_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found("Room not found"))?;

    let repo = room
        .repo
        .as_deref()
        .ok_or_else(|| bad_request("Room has no repository configured"))?;

    state
        .github
        .commit_files(
            &body.token,
            &room.created_by,
            repo,
            &body.branch,
            &body.files,
            &body.message,
        )
        .await
        .map_err(|e| {
            tracing::warn!(room_id = %room_id, error = %e, "Commit failed");
            provider_error(&format!("Failed to commit changes: {}", e))
        })?;

    Ok(Json(CommitResponse {
        success: true,
        branch: body.branch,
    }))
}

#[derive(Debug, Deserialize)]
pub struct PullRequestRequest {
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub branch: String,
    /// GitHub access token of the requesting user
    pub token: String,
}

/// POST /api/rooms/{id}/pr — Open a pull request from the given branch.
pub async fn open_pull_request(
    State(state): State<AppState>,
    _claims: Claims,
    Path(room_id): Path<String>,
    Json(body): Json<PullRequestRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let room = state
        .store
        .find_room(&room_id)
        .await
        .map_err(internal)?
        .ok_or_else(|| not_found("Room not found"))?;

    let repo = room
        .repo
        .as_deref()
        .ok_or_else(|| bad_request("Room has no repository configured"))?;

    let pull_request = state
        .github
        .open_pull_request(
            &body.token,
            &room.created_by,
            repo,
            &body.title,
            &body.body,
            &body.branch,
            "main",
        )
        .await
        .map_err(|e| {
            tracing::warn!(room_id = %room_id, error = %e, "Pull request failed");
            provider_error(&format!("Failed to create pull request: {}", e))
        })?;

    Ok(Json(pull_request))
}

fn not_found(message: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({ "error": message })),
    )
}

fn bad_request(message: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::BAD_REQUEST,
        Json(serde_json::json!({ "error": message })),
    )
}

fn provider_error(message: &str) -> (StatusCode, Json<Value>) {
    (
        StatusCode::BAD_GATEWAY,
        Json(serde_json::json!({ "error": message })),
    )
}

fn internal<E: std::fmt::Display>(e: E) -> (StatusCode, Json<Value>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": e.to_string() })),
    )
}
