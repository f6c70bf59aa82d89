mod ai;
mod auth;
mod config;
mod db;
mod error;
mod rooms;
mod routes;
mod session;
mod state;
mod store;
mod vcs;
mod ws;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;

use ai::GeminiProvider;
use config::{generate_config_template, Config};
use session::registry::{SessionConfig, SessionRegistry};
use store::sqlite::SqliteRoomStore;
use store::RoomStore;
use vcs::github::GithubClient;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load()?;

    // Handle --generate-config: print template and exit
    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    // Initialize tracing/logging
    if config.json_logs {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "codehive_server=info".parse().unwrap()),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .pretty()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "codehive_server=info".parse().unwrap()),
            )
            .init();
    }

    tracing::info!("Codehive server v{} starting", env!("CARGO_PKG_VERSION"));

    // Initialize SQLite database
    let db = db::init_db(&config.data_dir)?;

    // Load or generate JWT signing key (256-bit random, stored in data_dir)
    let jwt_secret = auth::jwt::load_or_generate_jwt_secret(&config.data_dir)?;

    let store: Arc<dyn RoomStore> = Arc::new(SqliteRoomStore::new(db));

    let ai_config = config.ai.clone().unwrap_or_default();
    if ai_config.api_key.is_empty() {
        tracing::warn!("No AI API key configured; assistance requests will be rejected");
    }
    let ai_provider: Arc<dyn ai::AiProvider> = Arc::new(GeminiProvider::new(ai_config));

    let github = Arc::new(GithubClient::new(
        config.github.clone().unwrap_or_default(),
    ));

    // Session registry: one actor task per active room
    let registry = SessionRegistry::new(
        store.clone(),
        ai_provider.clone(),
        SessionConfig {
            debounce: Duration::from_millis(config.debounce_ms),
            save_interval: Duration::from_secs(config.save_interval_secs),
        },
    );

    // Background cleanup of expired rooms
    store::retention::spawn_expiry_sweeper(store.clone(), config.sweep_interval_secs);

    // Build application state
    let app_state = state::AppState {
        store,
        registry,
        jwt_secret,
        ai: ai_provider,
        github,
        room_ttl: chrono::Duration::hours(config.room_ttl_hours as i64),
    };

    // Build router
    let app = routes::build_router(app_state);

    // Bind and serve
    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
