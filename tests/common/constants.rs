//! Shared constants for end-to-end tests
//!
//! When test data changes (session tokens, library songs, etc.),
//! update only this file.

// ============================================================================
// Sessions
// ============================================================================

/// Session token known to the test server
pub const TEST_TOKEN: &str = "test-session-token";

/// User the test token resolves to
pub const TEST_USER: &str = "testuser";

// ============================================================================
// Library
// ============================================================================

/// Backend every library song belongs to
pub const BACKEND: &str = "local";

/// Song ID for "Blue Monday"
pub const SONG_1_ID: &str = "song-1";

/// Song ID for "Blue in Green"
pub const SONG_2_ID: &str = "song-2";

/// Song ID for "Red Rain"
pub const SONG_3_ID: &str = "song-3";

// ============================================================================
// Timeouts
// ============================================================================

/// Maximum time to wait for server to become ready (milliseconds)
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Interval between server readiness checks (milliseconds)
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 10;

/// Maximum time to wait for a WebSocket message (milliseconds)
pub const MESSAGE_TIMEOUT_MS: u64 = 2000;
