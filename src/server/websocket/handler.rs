//! WebSocket route handler.
//!
//! Handles WebSocket upgrade, message loop, and cleanup.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::Response,
    Extension,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error};

use super::connection::Connection;
use super::messages::{system, ClientMessage, ServerMessage};
use super::relay::Relay;
use crate::server::session::Session;

/// WebSocket upgrade handler, mounted on [`super::SOCKET_PATH`].
///
/// Anonymous clients are accepted; whether they may trigger an event is
/// decided per event by the relay.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    session: Option<Extension<Session>>,
    State(relay): State<Arc<Relay>>,
) -> Response {
    let user = session.map(|Extension(s)| s.user);
    debug!("WebSocket upgrade for {}", user.as_deref().unwrap_or("anonymous"));

    ws.on_upgrade(move |socket| handle_socket(socket, user, relay))
}

/// Handle an established WebSocket connection.
async fn handle_socket(socket: WebSocket, user: Option<String>, relay: Arc<Relay>) {
    let logged_in = user.is_some();
    let (connection, outgoing_rx) = relay.open_connection(user, logged_in);
    debug!(
        "WebSocket connected: connection {} ({})",
        connection.id,
        connection.user.as_deref().unwrap_or("anonymous")
    );

    let (ws_sink, ws_stream) = socket.split();

    // Spawn task to forward outgoing messages to WebSocket
    let outgoing_handle = tokio::spawn(forward_outgoing(ws_sink, outgoing_rx));

    process_incoming(ws_stream, &connection, &relay).await;

    debug!("WebSocket disconnected: connection {}", connection.id);
    outgoing_handle.abort();
    relay.close_connection(&connection);
}

/// Forward messages from the outgoing channel to the WebSocket.
async fn forward_outgoing(
    mut ws_sink: futures::stream::SplitSink<WebSocket, Message>,
    mut outgoing_rx: mpsc::UnboundedReceiver<ServerMessage>,
) {
    while let Some(msg) = outgoing_rx.recv().await {
        match serde_json::to_string(&msg) {
            Ok(json) => {
                if ws_sink.send(Message::Text(json.into())).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                error!("Failed to serialize WebSocket message: {}", e);
            }
        }
    }
}

/// Process incoming messages from the WebSocket.
async fn process_incoming(
    mut ws_stream: futures::stream::SplitStream<WebSocket>,
    connection: &Connection,
    relay: &Arc<Relay>,
) {
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(msg) => relay.handle_client_message(connection, msg),
                Err(e) => {
                    debug!("Failed to parse client message: {}", e);
                    relay.send_error(
                        connection,
                        system::PARSE_ERROR,
                        format!("Invalid message format: {}", e),
                    );
                }
            },
            Ok(Message::Binary(_)) => {
                debug!("Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) => {
                // Axum/tungstenite handles pong automatically
                debug!("Received ping");
            }
            Ok(Message::Pong(_)) => {
                debug!("Received pong");
            }
            Ok(Message::Close(_)) => {
                debug!("Received close frame");
                break;
            }
            Err(e) => {
                debug!("WebSocket error: {}", e);
                break;
            }
        }
    }
}
