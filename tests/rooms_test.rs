//! Integration tests for the HTTP surface: token issuance, room CRUD,
//! durable file snapshots, and auth enforcement, against a real SQLite store.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::net::TcpListener;

use codehive_server::ai::GeminiProvider;
use codehive_server::config::{AiConfig, GithubConfig};
use codehive_server::session::registry::{SessionConfig, SessionRegistry};
use codehive_server::state::AppState;
use codehive_server::store::{RoomStore, SqliteRoomStore};
use codehive_server::vcs::github::GithubClient;

/// Start the server on a random port backed by a SQLite file in a temp dir.
/// Returns (base_url, store handle) — the store handle lets tests seed file
/// snapshots the way a live session's save would.
async fn start_test_server() -> (String, Arc<dyn RoomStore>) {
    let tmp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data_dir = tmp_dir.path().to_str().unwrap().to_string();

    let db = codehive_server::db::init_db(&data_dir).expect("Failed to init DB");
    let jwt_secret = codehive_server::auth::jwt::load_or_generate_jwt_secret(&data_dir)
        .expect("Failed to generate JWT secret");

    let store: Arc<dyn RoomStore> = Arc::new(SqliteRoomStore::new(db));
    let ai: Arc<dyn codehive_server::ai::AiProvider> =
        Arc::new(GeminiProvider::new(AiConfig::default()));
    let registry = SessionRegistry::new(
        store.clone(),
        ai.clone(),
        SessionConfig {
            debounce: Duration::from_millis(200),
            save_interval: Duration::from_secs(60),
        },
    );

    let state = AppState {
        store: store.clone(),
        registry,
        jwt_secret,
        ai,
        github: Arc::new(GithubClient::new(GithubConfig::default())),
        room_ttl: chrono::Duration::hours(24),
    };

    let app = codehive_server::routes::build_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
        let _keep = tmp_dir;
    });

    (format!("http://{}", addr), store)
}

async fn mint_token(base_url: &str, username: &str) -> String {
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{}/api/auth/token", base_url))
        .json(&json!({ "username": username }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    body["access_token"].as_str().unwrap().to_string()
}

async fn create_room(base_url: &str, token: &str, name: &str) -> String {
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("{}/api/rooms", base_url))
        .bearer_auth(token)
        .json(&json!({ "name": name }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 201);
    let body: Value = resp.json().await.unwrap();
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_endpoint_responds() {
    let (base_url, _store) = start_test_server().await;
    let resp = reqwest::get(format!("{}/health", base_url)).await.unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn token_issuance_and_room_lifecycle() {
    let (base_url, _store) = start_test_server().await;
    let client = reqwest::Client::new();

    let token = mint_token(&base_url, "alice").await;
    let room_id = create_room(&base_url, &token, "sprint-review").await;

    let resp = client
        .get(format!("{}/api/rooms/{}", base_url, room_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let room: Value = resp.json().await.unwrap();
    assert_eq!(room["name"], "sprint-review");
    assert_eq!(room["created_by"], "alice");
    assert!(room["files"].as_array().unwrap().is_empty());

    let resp = client
        .get(format!("{}/api/rooms/{}", base_url, "00000000-missing"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn room_endpoints_require_a_valid_token() {
    let (base_url, _store) = start_test_server().await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/api/rooms", base_url))
        .json(&json!({ "name": "noauth" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = client
        .post(format!("{}/api/rooms", base_url))
        .bearer_auth("garbage")
        .json(&json!({ "name": "noauth" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn empty_room_name_is_rejected() {
    let (base_url, _store) = start_test_server().await;
    let token = mint_token(&base_url, "alice").await;

    let resp = reqwest::Client::new()
        .post(format!("{}/api/rooms", base_url))
        .bearer_auth(&token)
        .json(&json!({ "name": "   " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
}

#[tokio::test]
async fn file_snapshots_can_be_read_and_updated() {
    let (base_url, store) = start_test_server().await;
    let client = reqwest::Client::new();

    let token = mint_token(&base_url, "alice").await;
    let room_id = create_room(&base_url, &token, "files").await;

    // Seed a snapshot the way a session save would
    store
        .save_files(
            &room_id,
            vec![("src/main.py".to_string(), "x=1".to_string())],
        )
        .await
        .unwrap();

    let resp = client
        .get(format!("{}/api/files/{}/src/main.py", base_url, room_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["content"], "x=1");

    let resp = client
        .post(format!("{}/api/files/{}/src/main.py", base_url, room_id))
        .bearer_auth(&token)
        .json(&json!({ "content": "x=2" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], true);

    let content = store.get_file(&room_id, "src/main.py").await.unwrap();
    assert_eq!(content.as_deref(), Some("x=2"));

    // Unknown paths are 404 for both read and update
    let resp = client
        .get(format!("{}/api/files/{}/nope.py", base_url, room_id))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);

    let resp = client
        .post(format!("{}/api/files/{}/nope.py", base_url, room_id))
        .bearer_auth(&token)
        .json(&json!({ "content": "x" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn save_files_bumps_versions_only_on_change() {
    let (base_url, store) = start_test_server().await;
    let token = mint_token(&base_url, "alice").await;
    let room_id = create_room(&base_url, &token, "versions").await;

    store
        .save_files(&room_id, vec![("a.py".to_string(), "1".to_string())])
        .await
        .unwrap();
    // Same content again: version must not move
    store
        .save_files(&room_id, vec![("a.py".to_string(), "1".to_string())])
        .await
        .unwrap();
    // Changed content: version bumps
    store
        .save_files(&room_id, vec![("a.py".to_string(), "2".to_string())])
        .await
        .unwrap();

    let room = store.find_room(&room_id).await.unwrap().unwrap();
    let file = room.files.iter().find(|f| f.path == "a.py").unwrap();
    assert_eq!(file.version, 2);
    assert_eq!(file.content, "2");
}

#[tokio::test]
async fn token_minting_is_rate_limited() {
    let (base_url, _store) = start_test_server().await;
    let client = reqwest::Client::new();

    // Burst capacity is 10 per IP; the 11th immediate request is rejected
    for _ in 0..10 {
        let resp = client
            .post(format!("{}/api/auth/token", base_url))
            .json(&json!({ "username": "burst" }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
    }
    let resp = client
        .post(format!("{}/api/auth/token", base_url))
        .json(&json!({ "username": "burst" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 429);
}
