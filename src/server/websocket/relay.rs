//! Relay between WebSocket clients and the player engine.
//!
//! Inbound client events go through an authorization gate and are forwarded
//! to the engine; engine lifecycle hooks turn into broadcasts of derived
//! playback/queue snapshots. The relay holds no player state of its own.

use std::collections::HashSet;
use std::sync::Arc;

use axum::{routing::get, Router};
use chrono::Utc;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, info, trace};

use super::connection::{Connection, ConnectionManager};
use super::handler::ws_handler;
use super::messages::{msg_types, system, ClientMessage, ServerMessage};
use super::player_messages::*;
use crate::player::{Player, PlayerEvents, Song};
use crate::server::metrics;
use crate::server::HttpServer;

/// Route the WebSocket endpoint is mounted on.
pub const SOCKET_PATH: &str = "/socket";

pub const DEFAULT_SENT_QUEUE_LIMIT: usize = 100;

#[derive(Debug, Clone, PartialEq)]
pub struct RelayConfig {
    /// Maximum number of queue entries included in `queue` messages.
    pub sent_queue_limit: usize,
    /// Events that require an authenticated connection. `None` disables the
    /// gate entirely.
    pub protected_paths: Option<HashSet<String>>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            sent_queue_limit: DEFAULT_SENT_QUEUE_LIMIT,
            protected_paths: None,
        }
    }
}

/// Decides whether a connection carries a valid identity.
pub trait Authenticator: Send + Sync {
    fn is_authenticated(&self, connection: &Connection) -> bool;
}

/// Trusts the logged-in flag the session layer attached to the connection.
pub struct SessionFlagAuthenticator;

impl Authenticator for SessionFlagAuthenticator {
    fn is_authenticated(&self, connection: &Connection) -> bool {
        connection.is_logged_in()
    }
}

/// Everything the relay needs, owned for its whole lifetime.
pub struct RelayContext {
    pub player: Arc<dyn Player>,
    pub authenticator: Arc<dyn Authenticator>,
    pub config: RelayConfig,
}

impl RelayContext {
    pub fn new(player: Arc<dyn Player>) -> Self {
        Self {
            player,
            authenticator: Arc::new(SessionFlagAuthenticator),
            config: RelayConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RelayConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = authenticator;
        self
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum RelayError {
    #[error("{0} module must be initialized before the relay")]
    MissingDependency(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InboundEvent {
    AddToQueue,
    RemoveFromQueue,
    MoveInQueue,
    SearchBackends,
    StartPlayback,
    PausePlayback,
    SkipSongs,
    ShuffleQueue,
    SetVolume,
}

impl InboundEvent {
    fn parse(name: &str) -> Option<Self> {
        let event = match name {
            msg_types::ADD_TO_QUEUE => Self::AddToQueue,
            msg_types::REMOVE_FROM_QUEUE => Self::RemoveFromQueue,
            msg_types::MOVE_IN_QUEUE => Self::MoveInQueue,
            msg_types::SEARCH_BACKENDS => Self::SearchBackends,
            msg_types::START_PLAYBACK => Self::StartPlayback,
            msg_types::PAUSE_PLAYBACK => Self::PausePlayback,
            msg_types::SKIP_SONGS => Self::SkipSongs,
            msg_types::SHUFFLE_QUEUE => Self::ShuffleQueue,
            msg_types::SET_VOLUME => Self::SetVolume,
            _ => return None,
        };
        Some(event)
    }

    fn name(self) -> &'static str {
        match self {
            Self::AddToQueue => msg_types::ADD_TO_QUEUE,
            Self::RemoveFromQueue => msg_types::REMOVE_FROM_QUEUE,
            Self::MoveInQueue => msg_types::MOVE_IN_QUEUE,
            Self::SearchBackends => msg_types::SEARCH_BACKENDS,
            Self::StartPlayback => msg_types::START_PLAYBACK,
            Self::PausePlayback => msg_types::PAUSE_PLAYBACK,
            Self::SkipSongs => msg_types::SKIP_SONGS,
            Self::ShuffleQueue => msg_types::SHUFFLE_QUEUE,
            Self::SetVolume => msg_types::SET_VOLUME,
        }
    }
}

pub struct Relay {
    player: Arc<dyn Player>,
    authenticator: Arc<dyn Authenticator>,
    config: RelayConfig,
    connections: Arc<ConnectionManager>,
}

impl Relay {
    /// Create a relay that is not mounted on any HTTP server.
    pub fn new(context: RelayContext) -> Arc<Self> {
        Arc::new(Self {
            player: context.player,
            authenticator: context.authenticator,
            config: context.config,
            connections: Arc::new(ConnectionManager::new()),
        })
    }

    /// Create the relay and mount its WebSocket route on `http`.
    ///
    /// Fails when the HTTP layer has not been set up yet. The caller still
    /// has to register the returned relay as a listener on the engine.
    pub fn attach(
        context: RelayContext,
        http: Option<&mut HttpServer>,
    ) -> Result<Arc<Self>, RelayError> {
        let http = http.ok_or(RelayError::MissingDependency("http"))?;
        let relay = Self::new(context);

        http.merge(
            Router::new()
                .route(SOCKET_PATH, get(ws_handler))
                .with_state(relay.clone()),
        );
        info!(
            "Relay attached at {} (queue limit {}, protected events: {})",
            SOCKET_PATH,
            relay.config.sent_queue_limit,
            relay
                .config
                .protected_paths
                .as_ref()
                .map(|p| p.len().to_string())
                .unwrap_or_else(|| "none".to_string())
        );
        Ok(relay)
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn connections(&self) -> &Arc<ConnectionManager> {
        &self.connections
    }

    pub fn playback_snapshot(&self) -> Option<PlaybackSnapshot> {
        PlaybackSnapshot::from_state(&self.player.state(), Utc::now())
    }

    pub fn queue_snapshot(&self) -> QueueSnapshot {
        QueueSnapshot::from_state(&self.player.state(), self.config.sent_queue_limit)
    }

    fn playback_message(&self) -> ServerMessage {
        ServerMessage::new(msg_types::PLAYBACK, self.playback_snapshot())
    }

    fn queue_message(&self) -> ServerMessage {
        ServerMessage::new(msg_types::QUEUE, self.queue_snapshot())
    }

    fn broadcast(&self, message: ServerMessage) {
        let event = message.msg_type.clone();
        let failed = self.connections.broadcast_to_all(message);
        if failed > 0 {
            debug!("Broadcast of {} failed for {} connections", event, failed);
        }
        metrics::record_broadcast(&event, failed);
    }

    /// Send a message to a single connection.
    pub fn reply(&self, connection: &Connection, message: ServerMessage) {
        if let Err(e) = self.connections.send_to_connection(connection.id, message) {
            debug!("Could not reach connection {}: {:?}", connection.id, e);
            metrics::record_send_failure();
        }
    }

    pub fn send_error(
        &self,
        connection: &Connection,
        code: &str,
        message: impl Into<String>,
    ) {
        self.reply(
            connection,
            ServerMessage::new(msg_types::ERROR, system::Error::new(code, message)),
        );
    }

    /// Register a new client and queue the current playback and queue state
    /// for it, ahead of anything broadcast afterwards.
    ///
    /// The snapshots are taken while the registry is locked for writing, so a
    /// concurrent broadcast is either reflected in them or delivered after.
    pub fn open_connection(
        &self,
        user: Option<String>,
        logged_in: bool,
    ) -> (Connection, mpsc::UnboundedReceiver<ServerMessage>) {
        let connection = Connection::new(self.connections.next_connection_id(), user, logged_in);
        let rx = self.connections.register_with(connection.id, || {
            vec![self.playback_message(), self.queue_message()]
        });
        metrics::record_connection_opened();

        (connection, rx)
    }

    pub fn close_connection(&self, connection: &Connection) {
        self.connections.unregister(connection.id);
        metrics::record_connection_closed();
    }

    /// Whether `connection` may trigger `event` right now.
    pub fn is_authorized(&self, connection: &Connection, event: &str) -> bool {
        let Some(protected_paths) = &self.config.protected_paths else {
            trace!("no protected paths configured");
            return true;
        };
        if !protected_paths.contains(event) {
            trace!("no protected path for event {}", event);
            return true;
        }
        if self.authenticator.is_authenticated(connection) {
            trace!(
                "accepting event {} from logged in connection {}",
                event,
                connection.id
            );
            true
        } else {
            trace!(
                "denying event {} from anonymous connection {}",
                event,
                connection.id
            );
            false
        }
    }

    /// Authorize and execute one client event.
    ///
    /// Must run inside a tokio runtime: backend searches complete on a
    /// spawned task.
    pub fn handle_client_message(self: &Arc<Self>, connection: &Connection, msg: ClientMessage) {
        let Some(event) = InboundEvent::parse(&msg.msg_type) else {
            debug!("Unknown message type: {}", msg.msg_type);
            self.send_error(
                connection,
                system::UNKNOWN_TYPE,
                format!("Unknown message type: {}", msg.msg_type),
            );
            return;
        };
        metrics::record_inbound_event(event.name());

        if !self.is_authorized(connection, event.name()) {
            metrics::record_denied_event(event.name());
            self.reply(connection, ServerMessage::empty(msg_types::INVALID_CREDENTIALS));
            return;
        }

        if let Err(e) = self.dispatch(connection, event, msg.payload) {
            debug!("Invalid {} payload: {}", event.name(), e);
            self.send_error(
                connection,
                system::INVALID_PAYLOAD,
                format!("Invalid {} payload: {}", event.name(), e),
            );
        }
    }

    fn dispatch(
        self: &Arc<Self>,
        connection: &Connection,
        event: InboundEvent,
        payload: Value,
    ) -> Result<(), serde_json::Error> {
        match event {
            InboundEvent::AddToQueue => {
                let p: AddToQueuePayload = serde_json::from_value(payload)?;
                let result = self.player.add_to_queue(p.songs, p.pos);
                self.reply(
                    connection,
                    ServerMessage::new(msg_types::ADD_TO_QUEUE_RESULT, result_payload(result)),
                );
            }
            InboundEvent::RemoveFromQueue => {
                let p: RemoveFromQueuePayload = serde_json::from_value(payload)?;
                let result = self.player.remove_from_queue(p.pos, p.cnt);
                self.reply(
                    connection,
                    ServerMessage::new(
                        msg_types::REMOVE_FROM_QUEUE_RESULT,
                        result_payload(result),
                    ),
                );
            }
            InboundEvent::MoveInQueue => {
                let p: MoveInQueuePayload = serde_json::from_value(payload)?;
                let result = self.player.move_in_queue(p.from, p.to, p.cnt);
                self.reply(
                    connection,
                    ServerMessage::new(msg_types::MOVE_IN_QUEUE_RESULT, result_payload(result)),
                );
            }
            InboundEvent::SearchBackends => {
                let relay = Arc::clone(self);
                let connection = connection.clone();
                tokio::spawn(async move {
                    let results = relay.player.search_backends(payload).await;
                    relay.reply(
                        &connection,
                        ServerMessage::new(msg_types::SEARCH_BACKENDS_RESULT, results),
                    );
                });
            }
            InboundEvent::StartPlayback => self.player.start_playback(payload),
            InboundEvent::PausePlayback => self.player.pause_playback(payload),
            InboundEvent::SkipSongs => self.player.skip_songs(payload),
            InboundEvent::ShuffleQueue => self.player.shuffle_queue(payload),
            InboundEvent::SetVolume => {
                let p: SetVolumePayload = serde_json::from_value(payload)?;
                self.player.set_volume(p.volume, p.user_id);
            }
        }
        Ok(())
    }
}

impl PlayerEvents for Relay {
    fn on_song_change(&self, _song: &Song) {
        self.broadcast(self.playback_message());
    }

    fn on_song_seek(&self, _song: &Song) {
        self.broadcast(self.playback_message());
    }

    fn on_song_pause(&self, _song: &Song) {
        self.broadcast(self.playback_message());
    }

    fn post_queue_modify(&self, _queue: &[Song]) {
        self.broadcast(self.queue_message());
    }

    fn on_end_of_queue(&self) {
        self.broadcast(self.playback_message());
        self.broadcast(self.queue_message());
    }

    fn on_volume_change(&self, volume: f64, user_id: &Value) {
        self.broadcast(ServerMessage::new(
            msg_types::VOLUME,
            VolumePayload {
                volume,
                user_id: user_id.clone(),
            },
        ));
    }
}
