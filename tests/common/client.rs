use super::constants::*;
use super::server::TestServer;
use futures::{SinkExt, StreamExt};
use http::header;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::timeout;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};

type WsStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// A WebSocket client talking to a [`TestServer`]
pub struct TestClient {
    ws: WsStream,
}

impl TestClient {
    /// Connects to the relay socket, presenting `session_token` as a cookie
    /// when given
    pub async fn connect(server: &TestServer, session_token: Option<&str>) -> Self {
        let mut request = http::Request::builder()
            .uri(server.ws_url())
            .header(header::HOST, "localhost")
            .header(header::CONNECTION, "Upgrade")
            .header(header::UPGRADE, "websocket")
            .header(header::SEC_WEBSOCKET_VERSION, "13")
            .header(header::SEC_WEBSOCKET_KEY, "dGhlIHNhbXBsZSBub25jZQ==");
        if let Some(token) = session_token {
            request = request.header(header::COOKIE, format!("session_token={}", token));
        }
        let request = request
            .body(())
            .expect("Failed to build WebSocket request");

        let (ws, _) = connect_async(request)
            .await
            .expect("Failed to connect to WebSocket");

        Self { ws }
    }

    /// Connects and consumes the initial playback and queue messages
    pub async fn connect_ready(server: &TestServer, session_token: Option<&str>) -> Self {
        let mut client = Self::connect(server, session_token).await;
        client
            .wait_for("playback")
            .await
            .expect("No initial playback message");
        client
            .wait_for("queue")
            .await
            .expect("No initial queue message");
        client
    }

    pub async fn send(&mut self, msg_type: &str, payload: Value) {
        let text = json!({ "type": msg_type, "payload": payload }).to_string();
        self.send_raw(&text).await;
    }

    pub async fn send_raw(&mut self, text: &str) {
        self.ws
            .send(Message::Text(text.to_string().into()))
            .await
            .expect("Failed to send WebSocket message");
    }

    /// Next JSON message from the server, or `None` on timeout or close
    pub async fn next_message(&mut self) -> Option<Value> {
        let result = timeout(Duration::from_millis(MESSAGE_TIMEOUT_MS), async {
            while let Some(Ok(msg)) = self.ws.next().await {
                if let Message::Text(text) = msg {
                    if let Ok(json) = serde_json::from_str::<Value>(&text) {
                        return Some(json);
                    }
                }
            }
            None
        })
        .await;

        result.ok().flatten()
    }

    /// Wait for a specific message type, skipping any others
    pub async fn wait_for(&mut self, expected_type: &str) -> Option<Value> {
        let result = timeout(Duration::from_millis(MESSAGE_TIMEOUT_MS), async {
            while let Some(Ok(msg)) = self.ws.next().await {
                if let Message::Text(text) = msg {
                    if let Ok(json) = serde_json::from_str::<Value>(&text) {
                        if json.get("type").and_then(|t| t.as_str()) == Some(expected_type) {
                            return Some(json);
                        }
                    }
                }
            }
            None
        })
        .await;

        result.ok().flatten()
    }

    pub async fn close(mut self) {
        self.ws.close(None).await.ok();
    }
}
