//! Player event payloads.
//!
//! Inbound command payloads and the derived snapshots pushed to clients.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::player::{PlayerError, PlayerState, Song};

// =============================================================================
// Client -> Server
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AddToQueuePayload {
    pub songs: Vec<Song>,
    #[serde(default)]
    pub pos: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoveFromQueuePayload {
    pub pos: usize,
    #[serde(default)]
    pub cnt: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MoveInQueuePayload {
    pub from: usize,
    pub to: usize,
    #[serde(default)]
    pub cnt: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SetVolumePayload {
    pub volume: f64,
    #[serde(rename = "userID", default)]
    pub user_id: Value,
}

// =============================================================================
// Server -> Client
// =============================================================================

/// The song at the head of the queue and how far into it playback is.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackSnapshot {
    #[serde(rename = "songID")]
    pub song_id: String,
    pub format: String,
    pub backend_name: String,
    pub duration: Value,
    /// Milliseconds into the song at the time the snapshot was taken.
    pub position: u64,
    pub playback_start: Option<DateTime<Utc>>,
    pub volume: f64,
}

impl PlaybackSnapshot {
    /// Derive the snapshot from engine state as of `now`. `None` when the queue
    /// is empty.
    pub fn from_state(state: &PlayerState, now: DateTime<Utc>) -> Option<Self> {
        let head = state.queue.first()?;
        let position = match state.playback_start {
            Some(start) => {
                let elapsed = (now - start).num_milliseconds().max(0) as u64;
                state.playback_position.saturating_add(elapsed)
            }
            None => state.playback_position,
        };
        Some(Self {
            song_id: head.song_id.clone(),
            format: head.format.clone(),
            backend_name: head.backend_name.clone(),
            duration: head.duration.clone(),
            position,
            playback_start: state.playback_start,
            volume: state.volume,
        })
    }
}

/// The first `limit` queue entries plus the real queue length.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueSnapshot {
    pub items: Vec<Song>,
    pub length: usize,
}

impl QueueSnapshot {
    pub fn from_state(state: &PlayerState, limit: usize) -> Self {
        Self {
            items: state.queue.iter().take(limit).cloned().collect(),
            length: state.queue.len(),
        }
    }
}

/// Raw passthrough of an engine volume change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VolumePayload {
    pub volume: f64,
    #[serde(rename = "userID")]
    pub user_id: Value,
}

/// Payload of the `*Result` replies: `None` on success, the engine's error
/// message otherwise.
pub fn result_payload(result: Result<(), PlayerError>) -> Option<String> {
    result.err().map(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn state_with(queue: Vec<Song>) -> PlayerState {
        PlayerState {
            queue,
            ..PlayerState::default()
        }
    }

    #[test]
    fn playback_snapshot_is_none_on_empty_queue() {
        let state = PlayerState::default();
        assert_eq!(PlaybackSnapshot::from_state(&state, Utc::now()), None);
    }

    #[test]
    fn playback_snapshot_adds_elapsed_time_while_playing() {
        let t0 = Utc::now();
        let mut state = state_with(vec![Song::new("a", "local", "mp3", 200000)]);
        state.playback_start = Some(t0);
        state.playback_position = 5000;

        let snapshot =
            PlaybackSnapshot::from_state(&state, t0 + Duration::milliseconds(2000)).unwrap();

        assert_eq!(snapshot.position, 7000);
        assert_eq!(snapshot.playback_start, Some(t0));
    }

    #[test]
    fn playback_snapshot_uses_stored_position_when_paused() {
        let mut state = state_with(vec![Song::new("a", "local", "mp3", 200000)]);
        state.playback_position = 5000;

        let snapshot = PlaybackSnapshot::from_state(&state, Utc::now()).unwrap();

        assert_eq!(snapshot.position, 5000);
        assert_eq!(snapshot.playback_start, None);
    }

    #[test]
    fn playback_snapshot_wire_format() {
        let mut state = state_with(vec![
            Song::new("a", "youtube", "opus", 1000).with_field("title", "ignored")
        ]);
        state.volume = 0.5;

        let value =
            serde_json::to_value(PlaybackSnapshot::from_state(&state, Utc::now())).unwrap();

        assert_eq!(
            value,
            json!({
                "songID": "a",
                "format": "opus",
                "backendName": "youtube",
                "duration": 1000,
                "position": 0,
                "playbackStart": null,
                "volume": 0.5
            })
        );
    }

    #[test]
    fn queue_snapshot_caps_items_but_not_length() {
        let queue: Vec<Song> = (0..25)
            .map(|i| Song::new(format!("s{}", i), "local", "mp3", 0))
            .collect();
        let state = state_with(queue);

        let snapshot = QueueSnapshot::from_state(&state, 10);

        assert_eq!(snapshot.items.len(), 10);
        assert_eq!(snapshot.items[9].song_id, "s9");
        assert_eq!(snapshot.length, 25);
    }

    #[test]
    fn queue_snapshot_single_item() {
        let song = Song::new("a", "local", "mp3", 0);
        let state = state_with(vec![song.clone()]);

        let snapshot = QueueSnapshot::from_state(&state, 10);

        assert_eq!(
            serde_json::to_value(&snapshot).unwrap(),
            json!({ "items": [serde_json::to_value(&song).unwrap()], "length": 1 })
        );
    }

    #[test]
    fn set_volume_payload_reads_user_id() {
        let payload: SetVolumePayload =
            serde_json::from_value(json!({"volume": 80, "userID": "user42"})).unwrap();

        assert_eq!(payload.volume, 80.0);
        assert_eq!(payload.user_id, json!("user42"));
    }

    #[test]
    fn set_volume_payload_accepts_any_user_id() {
        let numeric: SetVolumePayload =
            serde_json::from_value(json!({"volume": 80, "userID": 42})).unwrap();
        assert_eq!(numeric.user_id, json!(42));

        let missing: SetVolumePayload = serde_json::from_value(json!({"volume": 0.2})).unwrap();
        assert_eq!(missing.user_id, Value::Null);
    }

    #[test]
    fn playback_snapshot_position_saturates() {
        let t0 = Utc::now();
        let mut state = state_with(vec![Song::new("a", "local", "mp3", 1000)]);
        state.playback_start = Some(t0);
        state.playback_position = u64::MAX;

        let snapshot =
            PlaybackSnapshot::from_state(&state, t0 + Duration::milliseconds(5)).unwrap();

        assert_eq!(snapshot.position, u64::MAX);
    }

    #[test]
    fn playback_snapshot_keeps_fractional_duration() {
        let song: Song = serde_json::from_value(json!({
            "songID": "a", "backendName": "local", "duration": 215000.5
        }))
        .unwrap();
        let state = state_with(vec![song]);

        let snapshot = PlaybackSnapshot::from_state(&state, Utc::now()).unwrap();

        assert_eq!(snapshot.duration, json!(215000.5));
    }

    #[test]
    fn add_to_queue_payload_position_is_optional() {
        let payload: AddToQueuePayload = serde_json::from_value(json!({
            "songs": [{"songID": "a", "backendName": "local"}]
        }))
        .unwrap();

        assert_eq!(payload.pos, None);
        assert_eq!(payload.songs.len(), 1);
    }

    #[test]
    fn result_payload_echoes_error_message() {
        assert_eq!(result_payload(Ok(())), None);

        let err = PlayerError::InvalidPosition { pos: 3, len: 1 };
        assert_eq!(result_payload(Err(err.clone())), Some(err.to_string()));
    }
}
