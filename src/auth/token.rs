//! Token issuance endpoint.
//!
//! Identity verification itself lives in an external provider; this endpoint
//! stands in for that seam by minting an access token for a caller-supplied
//! identity. Rate-limited at the router level.

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::jwt;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub username: String,
    /// Stable user id; generated when absent
    pub user_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub user_id: String,
}

/// POST /api/auth/token — Mint an access token for the given identity.
pub async fn issue_token(
    State(state): State<AppState>,
    Json(body): Json<TokenRequest>,
) -> Result<Json<TokenResponse>, StatusCode> {
    if body.username.trim().is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    let user_id = body
        .user_id
        .unwrap_or_else(|| Uuid::now_v7().to_string());

    let access_token = jwt::issue_access_token(&state.jwt_secret, &user_id, &body.username)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;

    Ok(Json(TokenResponse {
        access_token,
        user_id,
    }))
}
