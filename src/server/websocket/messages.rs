//! WebSocket message types.
//!
//! Every frame is a JSON envelope `{ "type": <event name>, "payload": <data> }`.
//! Event-specific payloads are carried as JSON values and decoded by the relay.

use serde::{Deserialize, Serialize};

/// Server -> Client message envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServerMessage {
    /// Event name (e.g., "playback", "queue", "addToQueueResult")
    #[serde(rename = "type")]
    pub msg_type: String,
    pub payload: serde_json::Value,
}

impl ServerMessage {
    /// Create a new server message with the given type and payload.
    pub fn new(msg_type: impl Into<String>, payload: impl Serialize) -> Self {
        Self {
            msg_type: msg_type.into(),
            payload: serde_json::to_value(payload).unwrap_or(serde_json::Value::Null),
        }
    }

    /// Create a server message with a null payload.
    pub fn empty(msg_type: impl Into<String>) -> Self {
        Self {
            msg_type: msg_type.into(),
            payload: serde_json::Value::Null,
        }
    }
}

/// Client -> Server message envelope.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientMessage {
    #[serde(rename = "type")]
    pub msg_type: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl ClientMessage {
    pub fn new(msg_type: impl Into<String>, payload: impl Serialize) -> Self {
        Self {
            msg_type: msg_type.into(),
            payload: serde_json::to_value(payload).unwrap_or(serde_json::Value::Null),
        }
    }
}

/// Protocol-level messages, not tied to the player.
pub mod system {
    use serde::{Deserialize, Serialize};

    /// Sent when the server cannot process a client frame.
    #[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
    pub struct Error {
        pub code: String,
        pub message: String,
    }

    impl Error {
        pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
            Self {
                code: code.into(),
                message: message.into(),
            }
        }
    }

    pub const PARSE_ERROR: &str = "parse_error";
    pub const UNKNOWN_TYPE: &str = "unknown_type";
    pub const INVALID_PAYLOAD: &str = "invalid_payload";
}

/// Event names, as seen on the wire.
pub mod msg_types {
    // Client -> server
    pub const ADD_TO_QUEUE: &str = "addToQueue";
    pub const REMOVE_FROM_QUEUE: &str = "removeFromQueue";
    pub const MOVE_IN_QUEUE: &str = "moveInQueue";
    pub const SEARCH_BACKENDS: &str = "searchBackends";
    pub const START_PLAYBACK: &str = "startPlayback";
    pub const PAUSE_PLAYBACK: &str = "pausePlayback";
    pub const SKIP_SONGS: &str = "skipSongs";
    pub const SHUFFLE_QUEUE: &str = "shuffleQueue";
    pub const SET_VOLUME: &str = "setVolume";

    // Server -> client, replies to the sender
    pub const ADD_TO_QUEUE_RESULT: &str = "addToQueueResult";
    pub const REMOVE_FROM_QUEUE_RESULT: &str = "removeFromQueueResult";
    pub const MOVE_IN_QUEUE_RESULT: &str = "moveInQueueResult";
    pub const SEARCH_BACKENDS_RESULT: &str = "searchBackendsResult";
    pub const INVALID_CREDENTIALS: &str = "invalidCredentials";
    pub const ERROR: &str = "error";

    // Server -> client, state notifications
    pub const PLAYBACK: &str = "playback";
    pub const QUEUE: &str = "queue";
    pub const VOLUME: &str = "volume";

    /// Every event a client may send.
    pub const INBOUND: [&str; 9] = [
        ADD_TO_QUEUE,
        REMOVE_FROM_QUEUE,
        MOVE_IN_QUEUE,
        SEARCH_BACKENDS,
        START_PLAYBACK,
        PAUSE_PLAYBACK,
        SKIP_SONGS,
        SHUFFLE_QUEUE,
        SET_VOLUME,
    ];
}
