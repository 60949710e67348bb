//! Player Relay Library
//!
//! This library exposes the internal modules for testing and potential reuse.

pub mod config;
pub mod player;
pub mod server;

// Re-export commonly used types for convenience
pub use player::{InMemoryPlayer, Player, PlayerEvents, Song};
pub use server::websocket::{Relay, RelayConfig, RelayContext, RelayError};
pub use server::{HttpServer, RequestsLoggingLevel, ServerConfig};
