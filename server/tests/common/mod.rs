//! Shared helpers for integration tests.
#![allow(dead_code)]

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use campus_server::config::RelayConfig;
use campus_server::dm::store::MessageStore;
use campus_server::state::AppState;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub type WsWrite = SplitSink<WsStream, Message>;
pub type WsRead = SplitStream<WsStream>;

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
}

impl TestServer {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn token_for(&self, user_id: i64) -> String {
        campus_server::auth::jwt::issue_access_token(
            &self.state.jwt_secret,
            user_id,
            &format!("user{}", user_id),
            3600,
        )
        .expect("Failed to issue token")
    }

    pub async fn connect(&self) -> (WsWrite, WsRead) {
        let url = format!("ws://{}/ws", self.addr);
        let (ws_stream, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .expect("Failed to connect to WebSocket");
        ws_stream.split()
    }

    /// Connect and authenticate, consuming the auth_success frame.
    pub async fn connect_as(&self, user_id: i64) -> (WsWrite, WsRead) {
        let (mut write, mut read) = self.connect().await;
        send_json(
            &mut write,
            serde_json::json!({"type": "auth", "token": self.token_for(user_id)}),
        )
        .await;
        let ack = recv_json(&mut read).await;
        assert_eq!(ack["type"], "auth_success", "unexpected auth reply: {}", ack);
        (write, read)
    }

    /// Wait until the directory reaches the expected state for `user_id`.
    pub async fn wait_for_presence(&self, user_id: i64, present: bool) {
        for _ in 0..250 {
            if self.state.relay.directory().lookup(user_id).is_some() == present {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("user {} presence never became {}", user_id, present);
    }
}

/// Start the server on a random port with a fresh data directory.
pub async fn start_test_server() -> TestServer {
    start_with(RelayConfig::default(), None).await
}

pub async fn start_test_server_with_keepalive(keepalive: RelayConfig) -> TestServer {
    start_with(keepalive, None).await
}

/// Start a server whose chat relay persists through `store`.
pub async fn start_test_server_with_store(store: Arc<dyn MessageStore>) -> TestServer {
    start_with(RelayConfig::default(), Some(store)).await
}

async fn start_with(keepalive: RelayConfig, store: Option<Arc<dyn MessageStore>>) -> TestServer {
    let tmp_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let data_dir = tmp_dir.path().to_str().unwrap().to_string();

    let db = campus_server::db::init_db(&data_dir).expect("Failed to init DB");
    let jwt_secret = campus_server::auth::jwt::load_or_generate_jwt_secret(&data_dir)
        .expect("Failed to generate JWT secret");

    let state = match store {
        Some(store) => AppState::with_store(db, jwt_secret, keepalive, store),
        None => AppState::new(db, jwt_secret, keepalive),
    };
    let app = campus_server::routes::build_router(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
        // Keep tmp_dir alive so the data directory isn't deleted
        let _keep = tmp_dir;
    });

    TestServer { addr, state }
}

pub async fn send_json(write: &mut WsWrite, value: Value) {
    write
        .send(Message::Text(value.to_string().into()))
        .await
        .expect("Failed to send frame");
}

/// Next text frame as JSON, skipping control frames.
pub async fn recv_json(read: &mut WsRead) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(2), read.next())
            .await
            .expect("Expected a frame within timeout");
        match msg {
            Some(Ok(Message::Text(text))) => {
                return serde_json::from_str(text.as_str()).expect("Frame is not JSON")
            }
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
            other => panic!("Expected text frame, got: {:?}", other),
        }
    }
}

/// Assert that no text frame arrives within `millis`.
pub async fn expect_silence(read: &mut WsRead, millis: u64) {
    let result = tokio::time::timeout(Duration::from_millis(millis), read.next()).await;
    if let Ok(Some(Ok(msg))) = result {
        assert!(!msg.is_text(), "Expected no frame, got: {:?}", msg);
    }
}

/// Read until the server closes, asserting no text frame arrives first.
pub async fn recv_close(read: &mut WsRead) -> Option<CloseFrame> {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(5), read.next())
            .await
            .expect("Expected close within timeout");
        match msg {
            Some(Ok(Message::Close(frame))) => return frame,
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
            other => panic!("Expected close frame, got: {:?}", other),
        }
    }
}
