//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use http::{Request, StatusCode};
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::Value;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tower::ServiceExt;

use feedback_api::{AppState, build_app};
use feedback_core::config::AppConfig;
use feedback_core::result::AppResult;
use feedback_database::{MessageStore, UserDirectory};
use feedback_entity::message::PersistedMessage;

/// Signing secret shared by the test app and the test tokens.
pub const SECRET: &str = "integration-test-secret";

/// A test WebSocket client.
pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// User directory backed by a fixed map of `user_id -> logged_in`.
pub struct MemoryDirectory {
    users: HashMap<String, bool>,
}

#[async_trait]
impl UserDirectory for MemoryDirectory {
    async fn logged_in(&self, user_id: &str) -> AppResult<Option<bool>> {
        Ok(self.users.get(user_id).copied())
    }
}

/// Message store that keeps rows in memory.
#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<Vec<PersistedMessage>>,
}

impl MemoryStore {
    /// Snapshot of stored rows.
    pub fn rows(&self) -> Vec<PersistedMessage> {
        self.rows.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    async fn append(&self, message: &PersistedMessage) -> AppResult<()> {
        self.rows.lock().unwrap().push(message.clone());
        Ok(())
    }
}

/// Test response
pub struct TestResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Response body as JSON
    pub body: Value,
}

/// Test application context
pub struct TestApp {
    /// The Axum router for making test requests
    pub router: Router,
    /// Shared state, for inspecting the hubs directly
    pub state: AppState,
    /// Persisted chat messages
    pub store: Arc<MemoryStore>,
}

impl TestApp {
    /// Create a new test application.
    ///
    /// Known users: `a1` (admin), `s1` (staff), `u1`, `u7`, `u42` are logged
    /// in; `off` exists but is logged out.
    pub fn new() -> Self {
        let mut config = AppConfig::default();
        config.auth.jwt_secret = SECRET.to_string();
        config.auth.leeway_seconds = 0;

        let users = ["a1", "s1", "u1", "u7", "u42"]
            .into_iter()
            .map(|u| (u.to_string(), true))
            .chain(std::iter::once(("off".to_string(), false)))
            .collect();
        let directory = Arc::new(MemoryDirectory { users });
        let store = Arc::new(MemoryStore::default());

        let cors = config.server.cors.clone();
        let state = AppState::new(config, store.clone(), directory);
        let router = build_app(state.clone(), &cors);

        Self {
            router,
            state,
            store,
        }
    }

    /// Make a JSON request against the router without a network listener.
    pub async fn request(&self, method: &str, uri: &str, body: Option<Value>) -> TestResponse {
        let mut builder = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(serde_json::to_vec(&json).unwrap())
            }
            None => Body::empty(),
        };
        self.send(builder.body(body).unwrap()).await
    }

    /// Send a prepared request.
    pub async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        TestResponse { status, body }
    }

    /// Serve the app on an ephemeral local port.
    pub async fn spawn_server(&self) -> SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = self.router.clone();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        addr
    }

    /// Wait until the chat hub holds `expected` connections.
    pub async fn wait_for_chat(&self, expected: usize) {
        for _ in 0..200 {
            if self.state.realtime.chat_snapshot().await.unwrap().connections == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("chat hub never reached {expected} connections");
    }

    /// Wait until the notification hub holds `expected` connections.
    pub async fn wait_for_notifications(&self, expected: usize) {
        for _ in 0..200 {
            let snapshot = self.state.realtime.notification_snapshot().await.unwrap();
            if snapshot.connections == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("notification hub never reached {expected} connections");
    }

    /// Wait until the chat gate reaches the given state.
    pub async fn wait_for_gate(&self, open: bool) {
        for _ in 0..200 {
            if self.state.realtime.chat_snapshot().await.unwrap().chat_open == open {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("chat gate never became open={open}");
    }

    /// Wait until `expected` chat messages have been stored.
    pub async fn wait_for_rows(&self, expected: usize) {
        for _ in 0..200 {
            if self.store.rows().len() == expected {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("store never reached {expected} rows");
    }
}

/// Sign a token for `user_id` with `role`.
pub fn token(user_id: &str, role: &str) -> String {
    let claims = serde_json::json!({
        "user_id": user_id,
        "role": role,
        "iat": Utc::now().timestamp(),
        "exp": Utc::now().timestamp() + 3600,
    });
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

/// Open a WebSocket to `path` with the given token.
pub async fn connect(addr: SocketAddr, path: &str, token: &str) -> WsClient {
    let url = format!("ws://{addr}{path}?token={token}");
    let (ws, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    ws
}

/// Attempt an upgrade that should be rejected; returns the HTTP status.
pub async fn rejected_status(addr: SocketAddr, path_and_query: &str) -> u16 {
    let url = format!("ws://{addr}{path_and_query}");
    match tokio_tungstenite::connect_async(url).await {
        Ok(_) => panic!("upgrade to {path_and_query} unexpectedly succeeded"),
        Err(tungstenite::Error::Http(response)) => response.status().as_u16(),
        Err(e) => panic!("unexpected handshake error: {e}"),
    }
}

/// Send a text frame.
pub async fn send_text(ws: &mut WsClient, text: &str) {
    ws.send(Message::text(text)).await.unwrap();
}

/// Receive the next text frame, failing after two seconds.
pub async fn recv_text(ws: &mut WsClient) -> String {
    loop {
        let next = tokio::time::timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("socket closed")
            .unwrap();
        if let Message::Text(text) = next {
            return text.as_str().to_string();
        }
    }
}

/// Assert no text frame arrives within a short window.
pub async fn assert_silent(ws: &mut WsClient) {
    if let Ok(Some(Ok(Message::Text(text)))) =
        tokio::time::timeout(Duration::from_millis(200), ws.next()).await
    {
        panic!("unexpected frame: {}", text.as_str());
    }
}
