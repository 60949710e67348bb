//! WebSocket relay between connected clients and the player engine.

pub mod connection;
pub mod handler;
pub mod messages;
pub mod player_messages;
pub mod relay;

pub use connection::{Connection, ConnectionManager};
pub use messages::{msg_types, ClientMessage, ServerMessage};
pub use relay::{
    Authenticator, Relay, RelayConfig, RelayContext, RelayError, SessionFlagAuthenticator,
    SOCKET_PATH,
};
