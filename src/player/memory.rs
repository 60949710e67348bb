//! In-memory reference engine.
//!
//! Keeps the queue, playback timing and volume in a single mutex and searches
//! a static library loaded at startup. Listener hooks are collected while the
//! lock is held and dispatched after it is released, so listeners are free to
//! read the state back.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError, Weak};

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{Player, PlayerError, PlayerEvents, PlayerState, Song};

/// Fields of a library song matched against search terms, besides `songID`.
const SEARCHABLE_FIELDS: [&str; 3] = ["title", "artist", "album"];

enum Hook {
    SongChange(Song),
    SongSeek(Song),
    SongPause(Song),
    QueueModify(Vec<Song>),
    EndOfQueue,
    VolumeChange(f64, Value),
}

pub struct InMemoryPlayer {
    state: Mutex<PlayerState>,
    library: Vec<Song>,
    listeners: Mutex<Vec<Weak<dyn PlayerEvents>>>,
}

impl Default for InMemoryPlayer {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl InMemoryPlayer {
    pub fn new(library: Vec<Song>) -> Self {
        Self {
            state: Mutex::new(PlayerState::default()),
            library,
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Read a JSON array of songs to serve search results from.
    pub fn load_library(path: &Path) -> Result<Vec<Song>> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read library file: {:?}", path))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse library file: {:?}", path))
    }

    /// Register a listener. Only a weak reference is kept; dropped listeners
    /// are pruned on the next dispatch.
    pub fn add_listener(&self, listener: Weak<dyn PlayerEvents>) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    fn lock(&self) -> MutexGuard<'_, PlayerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, hooks: Vec<Hook>) {
        if hooks.is_empty() {
            return;
        }
        let listeners: Vec<_> = {
            let mut registered = self
                .listeners
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            registered.retain(|l| l.strong_count() > 0);
            registered.iter().filter_map(Weak::upgrade).collect()
        };

        for hook in &hooks {
            for listener in &listeners {
                match hook {
                    Hook::SongChange(song) => listener.on_song_change(song),
                    Hook::SongSeek(song) => listener.on_song_seek(song),
                    Hook::SongPause(song) => listener.on_song_pause(song),
                    Hook::QueueModify(queue) => listener.post_queue_modify(queue),
                    Hook::EndOfQueue => listener.on_end_of_queue(),
                    Hook::VolumeChange(volume, user_id) => {
                        listener.on_volume_change(*volume, user_id)
                    }
                }
            }
        }
    }
}

fn elapsed_ms(since: DateTime<Utc>) -> u64 {
    (Utc::now() - since).num_milliseconds().max(0) as u64
}

/// Reset playback for whatever song is now at the head of the queue.
fn restart_head(state: &mut PlayerState, hooks: &mut Vec<Hook>) {
    state.playback_position = 0;
    match state.queue.first() {
        Some(head) => {
            if state.playback_start.is_some() {
                state.playback_start = Some(Utc::now());
            }
            hooks.push(Hook::SongChange(head.clone()));
        }
        None => {
            state.playback_start = None;
            hooks.push(Hook::EndOfQueue);
        }
    }
}

/// Restart playback if a queue edit replaced the head song.
fn settle_head(state: &mut PlayerState, old_head: Option<Song>, hooks: &mut Vec<Hook>) {
    if state.queue.first() != old_head.as_ref() {
        restart_head(state, hooks);
    }
}

fn matches_terms(song: &Song, terms: &str) -> bool {
    if song.song_id.to_lowercase().contains(terms) {
        return true;
    }
    SEARCHABLE_FIELDS.iter().any(|field| {
        song.extra
            .get(*field)
            .and_then(Value::as_str)
            .is_some_and(|v| v.to_lowercase().contains(terms))
    })
}

#[async_trait]
impl Player for InMemoryPlayer {
    fn state(&self) -> PlayerState {
        self.lock().clone()
    }

    fn add_to_queue(&self, songs: Vec<Song>, pos: Option<usize>) -> Result<(), PlayerError> {
        if let Some(song) = songs.iter().find(|s| s.song_id.is_empty()) {
            return Err(PlayerError::InvalidSong(format!(
                "missing songID (backend {})",
                song.backend_name
            )));
        }
        if let Some(song) = songs.iter().find(|s| s.backend_name.is_empty()) {
            return Err(PlayerError::InvalidSong(format!(
                "missing backendName for {}",
                song.song_id
            )));
        }

        let mut hooks = Vec::new();
        {
            let mut state = self.lock();
            let len = state.queue.len();
            let pos = pos.unwrap_or(len);
            if pos > len {
                return Err(PlayerError::InvalidPosition { pos, len });
            }
            debug!("Adding {} songs to queue at {}", songs.len(), pos);

            let old_head = state.queue.first().cloned();
            state.queue.splice(pos..pos, songs);
            settle_head(&mut state, old_head, &mut hooks);
            hooks.push(Hook::QueueModify(state.queue.clone()));
        }
        self.emit(hooks);
        Ok(())
    }

    fn remove_from_queue(&self, pos: usize, cnt: Option<usize>) -> Result<(), PlayerError> {
        let mut hooks = Vec::new();
        {
            let mut state = self.lock();
            let len = state.queue.len();
            if pos >= len {
                return Err(PlayerError::InvalidPosition { pos, len });
            }
            let end = pos.saturating_add(cnt.unwrap_or(1)).min(len);
            debug!("Removing queue items {}..{}", pos, end);

            let old_head = state.queue.first().cloned();
            state.queue.drain(pos..end);
            settle_head(&mut state, old_head, &mut hooks);
            hooks.push(Hook::QueueModify(state.queue.clone()));
        }
        self.emit(hooks);
        Ok(())
    }

    fn move_in_queue(
        &self,
        from: usize,
        to: usize,
        cnt: Option<usize>,
    ) -> Result<(), PlayerError> {
        let cnt = cnt.unwrap_or(1);
        let mut hooks = Vec::new();
        {
            let mut state = self.lock();
            let len = state.queue.len();
            if from.saturating_add(cnt) > len {
                return Err(PlayerError::InvalidPosition { pos: from, len });
            }
            if to.saturating_add(cnt) > len {
                return Err(PlayerError::InvalidPosition { pos: to, len });
            }
            if cnt == 0 || from == to {
                return Ok(());
            }
            debug!("Moving {} queue items from {} to {}", cnt, from, to);

            let old_head = state.queue.first().cloned();
            let block: Vec<Song> = state.queue.drain(from..from + cnt).collect();
            state.queue.splice(to..to, block);
            settle_head(&mut state, old_head, &mut hooks);
            hooks.push(Hook::QueueModify(state.queue.clone()));
        }
        self.emit(hooks);
        Ok(())
    }

    async fn search_backends(&self, query: Value) -> Value {
        let terms = match &query {
            Value::String(s) => s.as_str(),
            _ => query.get("terms").and_then(Value::as_str).unwrap_or(""),
        }
        .trim()
        .to_lowercase();

        let mut by_backend: BTreeMap<&str, Vec<&Song>> = BTreeMap::new();
        if !terms.is_empty() {
            for song in self.library.iter().filter(|s| matches_terms(s, &terms)) {
                by_backend.entry(song.backend_name.as_str()).or_default().push(song);
            }
        }
        debug!(
            "Search for {:?} matched {} backends",
            terms,
            by_backend.len()
        );

        let results: serde_json::Map<String, Value> = by_backend
            .into_iter()
            .map(|(backend, songs)| (backend.to_string(), json!({ "songs": songs })))
            .collect();
        Value::Object(results)
    }

    fn start_playback(&self, data: Value) {
        let seek_to = data.as_f64().filter(|p| p.is_finite() && *p >= 0.0);

        let mut hooks = Vec::new();
        {
            let mut state = self.lock();
            let Some(head) = state.queue.first().cloned() else {
                debug!("startPlayback with an empty queue, ignoring");
                return;
            };
            match seek_to {
                Some(position) => {
                    // Seeks past the end land on the end of the song.
                    let position = match head.duration_ms() {
                        Some(duration) => position.min(duration),
                        None => position,
                    };
                    state.playback_position = position as u64;
                    state.playback_start = Some(Utc::now());
                    hooks.push(Hook::SongSeek(head));
                }
                None if state.playback_start.is_none() => {
                    state.playback_start = Some(Utc::now());
                    hooks.push(Hook::SongChange(head));
                }
                None => {}
            }
        }
        self.emit(hooks);
    }

    fn pause_playback(&self, _data: Value) {
        let mut hooks = Vec::new();
        {
            let mut state = self.lock();
            if let Some(start) = state.playback_start.take() {
                state.playback_position = state.playback_position.saturating_add(elapsed_ms(start));
                if let Some(head) = state.queue.first() {
                    hooks.push(Hook::SongPause(head.clone()));
                }
            }
        }
        self.emit(hooks);
    }

    fn skip_songs(&self, data: Value) {
        let cnt = data.as_u64().unwrap_or(1) as usize;
        let mut hooks = Vec::new();
        {
            let mut state = self.lock();
            if cnt == 0 || state.queue.is_empty() {
                return;
            }
            let end = cnt.min(state.queue.len());
            state.queue.drain(..end);
            restart_head(&mut state, &mut hooks);
            hooks.push(Hook::QueueModify(state.queue.clone()));
        }
        self.emit(hooks);
    }

    fn shuffle_queue(&self, _data: Value) {
        let mut hooks = Vec::new();
        {
            let mut state = self.lock();
            // The head is playing, only the upcoming songs move.
            if state.queue.len() > 2 {
                state.queue[1..].shuffle(&mut rand::rng());
            }
            hooks.push(Hook::QueueModify(state.queue.clone()));
        }
        self.emit(hooks);
    }

    fn set_volume(&self, volume: f64, user_id: Value) {
        if !volume.is_finite() || volume < 0.0 {
            warn!("Ignoring invalid volume {} from {}", volume, user_id);
            return;
        }
        self.lock().volume = volume;
        self.emit(vec![Hook::VolumeChange(volume, user_id)]);
    }
}
