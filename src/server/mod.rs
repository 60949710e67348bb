pub mod config;
mod http_layers;
pub mod metrics;
pub mod server;
pub mod session;
pub mod state;
pub mod websocket;

pub use config::ServerConfig;
pub use http_layers::*;
pub use server::{run_metrics_server, HttpServer};
