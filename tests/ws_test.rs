//! Integration tests for WebSocket connection, auth close codes, ping/pong,
//! and the realtime event flow over a real server socket.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use codehive_server::ai::GeminiProvider;
use codehive_server::config::{AiConfig, GithubConfig};
use codehive_server::session::registry::{SessionConfig, SessionRegistry};
use codehive_server::state::AppState;
use codehive_server::store::{MemoryRoomStore, RoomStore};
use codehive_server::vcs::github::GithubClient;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Start the server on a random port with an in-memory store and a fast
/// quiet window. Returns (addr, store handle, jwt secret).
async fn start_test_server() -> (SocketAddr, Arc<MemoryRoomStore>, Vec<u8>) {
    let tmp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data_dir = tmp_dir.path().to_str().unwrap().to_string();

    let jwt_secret = codehive_server::auth::jwt::load_or_generate_jwt_secret(&data_dir)
        .expect("Failed to generate JWT secret");

    let mem = Arc::new(MemoryRoomStore::new());
    let store: Arc<dyn RoomStore> = mem.clone();
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
        store,
        registry,
        jwt_secret: jwt_secret.clone(),
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

    (addr, mem, jwt_secret)
}

/// Mint a token through the HTTP endpoint, as a client would.
async fn mint_token(addr: SocketAddr, username: &str) -> String {
    let client = reqwest::Client::new();
    let resp = client
        .post(format!("http://{}/api/auth/token", addr))
        .json(&json!({ "username": username }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    body["access_token"].as_str().unwrap().to_string()
}

async fn connect(addr: SocketAddr, token: &str) -> WsStream {
    let url = format!("ws://{}/ws?token={}", addr, token);
    let (stream, _) = tokio_tungstenite::connect_async(url)
        .await
        .expect("WebSocket connect failed");
    stream
}

/// Receive the next JSON text event, skipping control frames.
async fn recv_event(ws: &mut WsStream) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(3), ws.next())
            .await
            .expect("timed out waiting for event")
            .expect("stream ended")
            .expect("WebSocket error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).expect("valid JSON event");
        }
    }
}

async fn send_event(ws: &mut WsStream, event: Value) {
    ws.send(Message::Text(event.to_string())).await.unwrap();
}

#[tokio::test]
async fn invalid_token_is_closed_with_4002() {
    let (addr, _store, _secret) = start_test_server().await;

    let mut ws = connect(addr, "not-a-jwt").await;
    let msg = tokio::time::timeout(Duration::from_secs(3), ws.next())
        .await
        .expect("timed out")
        .expect("stream ended")
        .expect("WebSocket error");

    match msg {
        Message::Close(Some(frame)) => assert_eq!(u16::from(frame.code), 4002),
        other => panic!("expected close frame, got {:?}", other),
    }
}

#[tokio::test]
async fn expired_token_is_closed_with_4001() {
    let (addr, _store, secret) = start_test_server().await;

    // Hand-craft a token that expired two hours ago (past validation leeway)
    let now = chrono::Utc::now().timestamp();
    let claims = codehive_server::auth::middleware::Claims {
        sub: "u1".to_string(),
        username: "alice".to_string(),
        iat: now - 7200,
        exp: now - 3600,
    };
    let token = jsonwebtoken::encode(
        &jsonwebtoken::Header::default(),
        &claims,
        &jsonwebtoken::EncodingKey::from_secret(&secret),
    )
    .unwrap();

    let mut ws = connect(addr, &token).await;
    let msg = tokio::time::timeout(Duration::from_secs(3), ws.next())
        .await
        .expect("timed out")
        .expect("stream ended")
        .expect("WebSocket error");

    match msg {
        Message::Close(Some(frame)) => assert_eq!(u16::from(frame.code), 4001),
        other => panic!("expected close frame, got {:?}", other),
    }
}

#[tokio::test]
async fn server_answers_client_pings() {
    let (addr, _store, _secret) = start_test_server().await;
    let token = mint_token(addr, "alice").await;

    let mut ws = connect(addr, &token).await;
    ws.send(Message::Ping(vec![9, 9].into())).await.unwrap();

    let msg = tokio::time::timeout(Duration::from_secs(3), ws.next())
        .await
        .expect("timed out")
        .expect("stream ended")
        .expect("WebSocket error");
    assert!(matches!(msg, Message::Pong(data) if data.as_slice() == [9, 9]));
}

#[tokio::test]
async fn join_room_returns_snapshot_and_notifies_others() {
    let (addr, store, _secret) = start_test_server().await;
    store.seed_room("room1", vec![("main.py", "x=1")]);

    let token_a = mint_token(addr, "alice").await;
    let token_b = mint_token(addr, "bob").await;

    let mut ws_a = connect(addr, &token_a).await;
    send_event(&mut ws_a, json!({ "type": "joinRoom", "roomId": "room1" })).await;

    let state_a = recv_event(&mut ws_a).await;
    assert_eq!(state_a["type"], "roomState");
    assert_eq!(state_a["files"]["main.py"], "x=1");
    assert_eq!(state_a["users"].as_array().unwrap().len(), 1);

    let mut ws_b = connect(addr, &token_b).await;
    send_event(&mut ws_b, json!({ "type": "joinRoom", "roomId": "room1" })).await;

    let state_b = recv_event(&mut ws_b).await;
    assert_eq!(state_b["type"], "roomState");
    assert_eq!(state_b["users"].as_array().unwrap().len(), 2);

    let joined = recv_event(&mut ws_a).await;
    assert_eq!(joined["type"], "userJoined");
    assert_eq!(joined["user"]["username"], "bob");
}

#[tokio::test]
async fn join_of_unknown_room_is_an_error_event() {
    let (addr, _store, _secret) = start_test_server().await;
    let token = mint_token(addr, "alice").await;

    let mut ws = connect(addr, &token).await;
    send_event(&mut ws, json!({ "type": "joinRoom", "roomId": "missing" })).await;

    let event = recv_event(&mut ws).await;
    assert_eq!(event["type"], "error");
    assert_eq!(event["message"], "Room not found");
}

#[tokio::test]
async fn events_before_join_are_rejected() {
    let (addr, _store, _secret) = start_test_server().await;
    let token = mint_token(addr, "alice").await;

    let mut ws = connect(addr, &token).await;
    send_event(
        &mut ws,
        json!({ "type": "codeChange", "file": "main.py", "content": "x=2" }),
    )
    .await;

    let event = recv_event(&mut ws).await;
    assert_eq!(event["type"], "error");
    assert_eq!(event["message"], "Join a room first");
}

#[tokio::test]
async fn code_change_is_broadcast_after_the_quiet_window() {
    let (addr, store, _secret) = start_test_server().await;
    store.seed_room("room1", vec![("main.py", "x=1")]);

    let token_a = mint_token(addr, "alice").await;
    let token_b = mint_token(addr, "bob").await;

    let mut ws_a = connect(addr, &token_a).await;
    send_event(&mut ws_a, json!({ "type": "joinRoom", "roomId": "room1" })).await;
    recv_event(&mut ws_a).await; // roomState

    let mut ws_b = connect(addr, &token_b).await;
    send_event(&mut ws_b, json!({ "type": "joinRoom", "roomId": "room1" })).await;
    recv_event(&mut ws_b).await; // roomState
    recv_event(&mut ws_a).await; // userJoined

    send_event(
        &mut ws_a,
        json!({
            "type": "codeChange",
            "file": "main.py",
            "content": "x=2",
            "cursor": { "line": 1, "column": 4 },
        }),
    )
    .await;

    let update = recv_event(&mut ws_b).await;
    assert_eq!(update["type"], "codeUpdate");
    assert_eq!(update["file"], "main.py");
    assert_eq!(update["content"], "x=2");
    assert_eq!(update["cursor"]["line"], 1);
}

#[tokio::test]
async fn disconnect_removes_the_user_from_the_room() {
    let (addr, store, _secret) = start_test_server().await;
    store.seed_room("room1", vec![]);

    let token_a = mint_token(addr, "alice").await;
    let token_b = mint_token(addr, "bob").await;

    let mut ws_a = connect(addr, &token_a).await;
    send_event(&mut ws_a, json!({ "type": "joinRoom", "roomId": "room1" })).await;
    recv_event(&mut ws_a).await; // roomState

    let mut ws_b = connect(addr, &token_b).await;
    send_event(&mut ws_b, json!({ "type": "joinRoom", "roomId": "room1" })).await;
    recv_event(&mut ws_b).await; // roomState
    recv_event(&mut ws_a).await; // userJoined

    drop(ws_b);

    let left = recv_event(&mut ws_a).await;
    assert_eq!(left["type"], "userLeft");
    assert_eq!(left["users"].as_array().unwrap().len(), 1);
}
