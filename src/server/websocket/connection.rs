//! WebSocket connection manager.
//!
//! Tracks all active WebSocket connections by connection id. Provides methods
//! to send messages to a single connection or broadcast to all of them.
//!
//! Everything here is synchronous: engine hooks broadcast from whatever thread
//! the engine runs on, with or without an async runtime.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

use tokio::sync::mpsc;

use super::messages::ServerMessage;

/// A client's live socket session.
///
/// The `logged_in` flag is set once from the session found on the upgrade
/// request. Clones of a connection share it.
#[derive(Debug, Clone)]
pub struct Connection {
    pub id: usize,
    pub user: Option<String>,
    logged_in: Arc<AtomicBool>,
}

impl Connection {
    pub fn new(id: usize, user: Option<String>, logged_in: bool) -> Self {
        Self {
            id,
            user,
            logged_in: Arc::new(AtomicBool::new(logged_in)),
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.logged_in.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub fn set_logged_in(&self, logged_in: bool) {
        self.logged_in.store(logged_in, Ordering::SeqCst);
    }
}

/// Information about an active WebSocket connection.
struct ConnectionEntry {
    sender: mpsc::UnboundedSender<ServerMessage>,
}

/// Error type for send operations.
#[derive(Debug, Clone, PartialEq)]
pub enum SendError {
    /// The target connection is not registered.
    NotConnected,
    /// The connection channel is closed (client went away).
    Disconnected,
}

/// Manages all active WebSocket connections.
pub struct ConnectionManager {
    connections: RwLock<HashMap<usize, ConnectionEntry>>,
    next_id: AtomicUsize,
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
            next_id: AtomicUsize::new(1),
        }
    }

    /// Allocate an id for a new connection.
    pub fn next_connection_id(&self) -> usize {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Register a new connection.
    ///
    /// Returns a receiver for outgoing messages. The caller should forward
    /// messages from this receiver to the WebSocket.
    ///
    /// Registering an id twice replaces the old connection, whose receiver
    /// then sees its channel closed.
    pub fn register(&self, connection_id: usize) -> mpsc::UnboundedReceiver<ServerMessage> {
        self.register_with(connection_id, Vec::new)
    }

    /// Register a connection whose channel starts with `initial`.
    ///
    /// `initial` runs while the registry is locked for writing, so no
    /// broadcast can reach the new connection ahead of those messages.
    pub fn register_with<F>(
        &self,
        connection_id: usize,
        initial: F,
    ) -> mpsc::UnboundedReceiver<ServerMessage>
    where
        F: FnOnce() -> Vec<ServerMessage>,
    {
        let (tx, rx) = mpsc::unbounded_channel();

        let mut conns = self
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        for message in initial() {
            // The receiver is still held here, so this cannot fail.
            let _ = tx.send(message);
        }
        conns.insert(connection_id, ConnectionEntry { sender: tx });

        rx
    }

    /// Unregister a connection (called on disconnect).
    pub fn unregister(&self, connection_id: usize) {
        let mut conns = self
            .connections
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        conns.remove(&connection_id);
    }

    /// Send a message to a single connection.
    pub fn send_to_connection(
        &self,
        connection_id: usize,
        message: ServerMessage,
    ) -> Result<(), SendError> {
        let conns = self
            .connections
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        match conns.get(&connection_id) {
            Some(entry) => entry
                .sender
                .send(message)
                .map_err(|_| SendError::Disconnected),
            None => Err(SendError::NotConnected),
        }
    }

    /// Broadcast a message to every registered connection.
    ///
    /// Returns count of failed sends.
    pub fn broadcast_to_all(&self, message: ServerMessage) -> usize {
        let conns = self
            .connections
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut failed_count = 0;

        for entry in conns.values() {
            if entry.sender.send(message.clone()).is_err() {
                failed_count += 1;
            }
        }

        failed_count
    }

    /// Check if a connection is registered.
    pub fn is_connected(&self, connection_id: usize) -> bool {
        let conns = self
            .connections
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        conns.contains_key(&connection_id)
    }

    /// Get the total number of active connections.
    pub fn total_connections(&self) -> usize {
        let conns = self
            .connections
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        conns.len()
    }

    /// Get list of all registered connection ids.
    pub fn connected_ids(&self) -> Vec<usize> {
        let conns = self
            .connections
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        conns.keys().copied().collect()
    }
}
