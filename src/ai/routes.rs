//! REST surface for AI assistance, mirroring the realtime `ai:request`
//! operations for clients that are not in a session.

use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::ai::{build_prompt, AiPayload, AiRequestType};
use crate::auth::middleware::Claims;
use crate::state::AppState;

/// POST /api/ai/suggest
pub async fn suggest(
    State(state): State<AppState>,
    claims: Claims,
    Json(payload): Json<AiPayload>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let text = run_request(&state, &claims, AiRequestType::Suggest, &payload).await?;

    // First line as the insertion text, remainder as an explanation.
    let mut lines = text.splitn(2, '\n');
    let snippet = lines.next().unwrap_or_default().trim().to_string();
    let description = lines.next().unwrap_or_default().trim().to_string();

    Ok(Json(json!({
        "success": true,
        "suggestions": [{ "text": snippet, "description": description }],
    })))
}

/// POST /api/ai/debug
pub async fn debug(
    State(state): State<AppState>,
    claims: Claims,
    Json(payload): Json<AiPayload>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let text = run_request(&state, &claims, AiRequestType::Debug, &payload).await?;
    Ok(Json(json!({ "success": true, "explanation": text })))
}

/// POST /api/ai/optimize
pub async fn optimize(
    State(state): State<AppState>,
    claims: Claims,
    Json(payload): Json<AiPayload>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let text = run_request(&state, &claims, AiRequestType::Optimize, &payload).await?;
    Ok(Json(json!({ "success": true, "explanation": text })))
}

/// POST /api/ai/explain
pub async fn explain(
    State(state): State<AppState>,
    claims: Claims,
    Json(payload): Json<AiPayload>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let text = run_request(&state, &claims, AiRequestType::Explain, &payload).await?;
    Ok(Json(json!({ "success": true, "explanation": text })))
}

/// POST /api/ai/generate
pub async fn generate(
    State(state): State<AppState>,
    claims: Claims,
    Json(payload): Json<AiPayload>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let text = run_request(&state, &claims, AiRequestType::Generate, &payload).await?;
    Ok(Json(json!({ "success": true, "suggestion": text })))
}

async fn run_request(
    state: &AppState,
    claims: &Claims,
    request_type: AiRequestType,
    payload: &AiPayload,
) -> Result<String, (StatusCode, Json<Value>)> {
    let request = build_prompt(request_type, payload).map_err(|message| {
        (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": message })),
        )
    })?;

    state
        .ai
        .generate(&request.prompt, &request.language, &request.context)
        .await
        .map_err(|e| {
            tracing::warn!(
                user = %claims.username,
                request_type = request_type.as_str(),
                error = %e,
                "AI request failed"
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "success": false, "error": "AI request failed" })),
            )
        })
}
