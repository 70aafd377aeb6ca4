//! Test helpers for integration tests
//!
//! Spawns a full server (REST + gateway) on an ephemeral port with its own
//! in-memory store and provides HTTP/WebSocket client utilities.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use futures_util::{SinkExt, StreamExt};
use reqwest::{Client, Response};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::{
    connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream,
};

use campus_common::{
    AppConfig, AppSettings, AuthConfig, CorsConfig, Environment, GatewayConfig, JwtVerifier,
    ServerConfig,
};
use campus_core::Snowflake;
use campus_gateway::{build_state, create_app};
use campus_store::MemoryStore;

/// Shared secret for test tokens
const TEST_SECRET: &str = "integration-test-secret";

/// How long to wait for an expected socket event
const EVENT_TIMEOUT: Duration = Duration::from_secs(5);

/// A live WebSocket client connection
pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Build a test configuration
pub fn test_config() -> AppConfig {
    AppConfig {
        app: AppSettings {
            name: "campus-realtime-test".to_string(),
            env: Environment::Development,
        },
        server: ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
        },
        auth: AuthConfig {
            jwt_secret: TEST_SECRET.to_string(),
            token_expiry_secs: 3600,
        },
        cors: CorsConfig::default(),
        gateway: GatewayConfig {
            message_buffer: 64,
            worker_id: 0,
        },
    }
}

/// Test server instance that manages lifecycle
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: Client,
    pub store: Arc<MemoryStore>,
    pub verifier: Arc<JwtVerifier>,
    _handle: JoinHandle<()>,
}

impl TestServer {
    /// Start a new test server on an ephemeral port
    pub async fn start() -> Result<Self> {
        let config = test_config();
        let store = Arc::new(MemoryStore::new());
        let verifier = Arc::new(JwtVerifier::new(
            &config.auth.jwt_secret,
            config.auth.token_expiry_secs,
        ));

        let state = build_state(store.clone(), verifier.clone(), config);
        let app = create_app(state);

        let listener = TcpListener::bind(("127.0.0.1", 0)).await?;
        let addr = listener.local_addr()?;

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        // Wait for the server to start accepting
        tokio::time::sleep(Duration::from_millis(50)).await;

        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

        Ok(Self {
            addr,
            client,
            store,
            verifier,
            _handle: handle,
        })
    }

    /// Issue a bearer token for a user id
    pub fn token(&self, user_id: Snowflake) -> String {
        self.verifier.issue(user_id).expect("token issue failed")
    }

    /// Base URL for the server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Make a GET request with auth token
    pub async fn get(&self, path: &str, token: &str) -> Result<Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await?)
    }

    /// Make a POST request with JSON body and auth token
    pub async fn post<T: Serialize>(&self, path: &str, token: &str, body: &T) -> Result<Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {token}"))
            .json(body)
            .send()
            .await?)
    }

    /// Make a PATCH request with JSON body and auth token
    pub async fn patch<T: Serialize>(&self, path: &str, token: &str, body: &T) -> Result<Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self
            .client
            .patch(&url)
            .header("Authorization", format!("Bearer {token}"))
            .json(body)
            .send()
            .await?)
    }

    /// Make a DELETE request with auth token
    pub async fn delete(&self, path: &str, token: &str) -> Result<Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self
            .client
            .delete(&url)
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await?)
    }

    /// Open an authenticated WebSocket connection
    pub async fn ws_connect(&self, token: &str) -> Result<WsClient> {
        let url = format!("ws://{}/ws?token={token}", self.addr);
        let (stream, _) = connect_async(url).await?;
        Ok(stream)
    }

    /// Attempt a WebSocket connection with a raw query string
    pub async fn ws_connect_raw(&self, query: &str) -> Result<WsClient> {
        let url = format!("ws://{}/ws{query}", self.addr);
        let (stream, _) = connect_async(url).await?;
        Ok(stream)
    }
}

/// Send an `{"event", "data"}` envelope over a socket
pub async fn send_event(ws: &mut WsClient, event: &str, data: Value) -> Result<()> {
    let frame = json!({ "event": event, "data": data }).to_string();
    ws.send(Message::Text(frame)).await?;
    Ok(())
}

/// Read the next `{"event", "data"}` frame, skipping non-text frames
pub async fn next_event(ws: &mut WsClient) -> Result<(String, Value)> {
    loop {
        let msg = timeout(EVENT_TIMEOUT, ws.next())
            .await
            .map_err(|_| anyhow!("timed out waiting for a frame"))?
            .ok_or_else(|| anyhow!("socket closed"))??;

        if let Message::Text(text) = msg {
            let value: Value = serde_json::from_str(&text)?;
            let event = value["event"]
                .as_str()
                .ok_or_else(|| anyhow!("frame missing event field"))?
                .to_string();
            return Ok((event, value["data"].clone()));
        }
    }
}

/// Read frames until the named event arrives; unrelated events are skipped
pub async fn wait_for_event(ws: &mut WsClient, name: &str) -> Result<Value> {
    let deadline = tokio::time::Instant::now() + EVENT_TIMEOUT;
    loop {
        if tokio::time::Instant::now() > deadline {
            return Err(anyhow!("timed out waiting for {name}"));
        }
        let (event, data) = next_event(ws).await?;
        if event == name {
            return Ok(data);
        }
    }
}

/// Assert that no frame of the named event arrives within a short window
pub async fn assert_no_event(ws: &mut WsClient, name: &str) -> Result<()> {
    let window = Duration::from_millis(300);
    let end = tokio::time::Instant::now() + window;
    while tokio::time::Instant::now() < end {
        match timeout(window, ws.next()).await {
            Err(_) => return Ok(()),
            Ok(None) => return Ok(()),
            Ok(Some(msg)) => {
                if let Message::Text(text) = msg? {
                    let value: Value = serde_json::from_str(&text)?;
                    if value["event"].as_str() == Some(name) {
                        return Err(anyhow!("unexpected {name} frame: {text}"));
                    }
                }
            }
        }
    }
    Ok(())
}
