use axum::{middleware, Json, Router};
use std::sync::Arc;
use tower_governor::key_extractor::PeerIpKeyExtractor;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};

use crate::ai::routes as ai_routes;
use crate::auth::middleware::JwtSecret;
use crate::auth::token;
use crate::rooms::{crud as room_crud, files as room_files};
use crate::state::AppState;
use crate::vcs::routes as vcs_routes;
use crate::ws::handler as ws_handler;

/// Inject the JWT secret into request extensions so the Claims extractor can find it.
async fn inject_jwt_secret(
    axum::extract::State(state): axum::extract::State<AppState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: middleware::Next,
) -> axum::response::Response {
    req.extensions_mut()
        .insert(JwtSecret(state.jwt_secret.clone()));
    next.run(req).await
}

/// GET /api/server/info — Public endpoint with server identity and limits.
async fn server_info() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "codehive-server",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Build the full axum Router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    // Rate limiting: 10 token mints per minute per IP
    // Uses PeerIpKeyExtractor which reads from ConnectInfo<SocketAddr>
    let auth_governor_config = Arc::new(
        GovernorConfigBuilder::default()
            .key_extractor(PeerIpKeyExtractor)
            .per_second(6) // 1 token every 6 seconds = 10 per minute
            .burst_size(10)
            .finish()
            .expect("Failed to build governor config"),
    );
    let auth_limiter = auth_governor_config.limiter().clone();

    // Spawn background task to clean up rate limiter state
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            auth_limiter.retain_recent();
        }
    });

    let auth_routes = Router::new()
        .route("/api/auth/token", axum::routing::post(token::issue_token))
        .layer(GovernorLayer {
            config: auth_governor_config,
        });

    // AI calls fan out to a paid upstream; keep them to 20 per minute per IP
    let ai_governor_config = Arc::new(
        GovernorConfigBuilder::default()
            .key_extractor(PeerIpKeyExtractor)
            .per_second(3)
            .burst_size(20)
            .finish()
            .expect("Failed to build AI governor config"),
    );
    let ai_limiter = ai_governor_config.limiter().clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(std::time::Duration::from_secs(60)).await;
            ai_limiter.retain_recent();
        }
    });

    let ai_endpoint_routes = Router::new()
        .route("/api/ai/suggest", axum::routing::post(ai_routes::suggest))
        .route("/api/ai/debug", axum::routing::post(ai_routes::debug))
        .route("/api/ai/optimize", axum::routing::post(ai_routes::optimize))
        .route("/api/ai/explain", axum::routing::post(ai_routes::explain))
        .route("/api/ai/generate", axum::routing::post(ai_routes::generate))
        .layer(GovernorLayer {
            config: ai_governor_config,
        });

    // Room CRUD and durable file snapshots (JWT required — Claims extractor
    // validates the token)
    let room_routes = Router::new()
        .route("/api/rooms", axum::routing::post(room_crud::create_room))
        .route("/api/rooms/{id}", axum::routing::get(room_crud::get_room))
        .route(
            "/api/files/{room_id}/{*path}",
            axum::routing::get(room_files::get_file),
        )
        .route(
            "/api/files/{room_id}/{*path}",
            axum::routing::post(room_files::update_file),
        );

    // VCS integration (commit / pull request against the room's repository)
    let vcs_endpoint_routes = Router::new()
        .route(
            "/api/rooms/{id}/commit",
            axum::routing::post(vcs_routes::commit_files),
        )
        .route(
            "/api/rooms/{id}/pr",
            axum::routing::post(vcs_routes::open_pull_request),
        );

    // Public routes (no auth required, no rate limiting)
    let public_routes =
        Router::new().route("/api/server/info", axum::routing::get(server_info));

    // WebSocket endpoint (auth via query param, not JWT header)
    let ws_routes = Router::new().route("/ws", axum::routing::get(ws_handler::ws_upgrade));

    // Health check
    let health = Router::new().route("/health", axum::routing::get(health_check));

    Router::new()
        .merge(auth_routes)
        .merge(ai_endpoint_routes)
        .merge(room_routes)
        .merge(vcs_endpoint_routes)
        .merge(public_routes)
        .merge(ws_routes)
        .merge(health)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            inject_jwt_secret,
        ))
        .with_state(state)
}

/// Basic health check endpoint
async fn health_check() -> &'static str {
    "ok"
}
