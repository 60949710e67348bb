//! Player engine surface consumed by the relay.
//!
//! The relay never owns queue or playback state. It reads a [`PlayerState`]
//! from a [`Player`] and forwards client commands to it; the engine in turn
//! notifies registered [`PlayerEvents`] listeners about lifecycle changes.

mod memory;

pub use memory::InMemoryPlayer;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A queue entry.
///
/// Only the fields the relay reads are typed; anything else a backend attaches
/// (title, artist, album art...) is carried through untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Song {
    #[serde(rename = "songID")]
    pub song_id: String,
    #[serde(default)]
    pub format: String,
    pub backend_name: String,
    /// Track length in milliseconds, forwarded exactly as the backend sent it.
    #[serde(default, skip_serializing_if = "Value::is_null")]
    pub duration: Value,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Song {
    pub fn new(
        song_id: impl Into<String>,
        backend_name: impl Into<String>,
        format: impl Into<String>,
        duration: u64,
    ) -> Self {
        Self {
            song_id: song_id.into(),
            format: format.into(),
            backend_name: backend_name.into(),
            duration: duration.into(),
            extra: serde_json::Map::new(),
        }
    }

    /// Track length in milliseconds, when the entry carries a numeric one.
    pub fn duration_ms(&self) -> Option<f64> {
        self.duration.as_f64().filter(|d| d.is_finite() && *d > 0.0)
    }

    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// Point-in-time copy of the engine state the relay derives snapshots from.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerState {
    pub queue: Vec<Song>,
    /// When the current song (re)started playing; `None` while paused or stopped.
    pub playback_start: Option<DateTime<Utc>>,
    /// Offset into the current song in milliseconds, as of `playback_start`.
    pub playback_position: u64,
    pub volume: f64,
}

impl Default for PlayerState {
    fn default() -> Self {
        Self {
            queue: Vec::new(),
            playback_start: None,
            playback_position: 0,
            volume: 1.0,
        }
    }
}

/// Errors returned by queue mutations. These are values, never panics: the
/// relay echoes them back to the client that asked for the change.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlayerError {
    #[error("invalid queue position {pos} (queue length {len})")]
    InvalidPosition { pos: usize, len: usize },
    #[error("invalid song: {0}")]
    InvalidSong(String),
    #[error("{0}")]
    Backend(String),
}

/// The capability surface of a player engine.
#[async_trait]
pub trait Player: Send + Sync {
    fn state(&self) -> PlayerState;

    /// Insert `songs` at `pos`, or append when `pos` is `None`.
    fn add_to_queue(&self, songs: Vec<Song>, pos: Option<usize>) -> Result<(), PlayerError>;

    fn remove_from_queue(&self, pos: usize, cnt: Option<usize>) -> Result<(), PlayerError>;

    fn move_in_queue(&self, from: usize, to: usize, cnt: Option<usize>)
        -> Result<(), PlayerError>;

    /// Query every configured backend. Resolves once, whenever the slowest
    /// backend has answered.
    async fn search_backends(&self, query: Value) -> Value;

    fn start_playback(&self, data: Value);

    fn pause_playback(&self, data: Value);

    fn skip_songs(&self, data: Value);

    fn shuffle_queue(&self, data: Value);

    /// `user_id` is whatever the client sent, `Null` when absent.
    fn set_volume(&self, volume: f64, user_id: Value);
}

/// Lifecycle hooks an engine invokes on its listeners.
///
/// All hooks default to no-ops so listeners only implement what they need.
pub trait PlayerEvents: Send + Sync {
    fn on_song_change(&self, _song: &Song) {}

    fn on_song_seek(&self, _song: &Song) {}

    fn on_song_pause(&self, _song: &Song) {}

    fn post_queue_modify(&self, _queue: &[Song]) {}

    fn on_end_of_queue(&self) {}

    fn on_volume_change(&self, _volume: f64, _user_id: &Value) {}
}
