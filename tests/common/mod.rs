//! Common test infrastructure
//!
//! This module provides all the infrastructure needed for end-to-end tests.
//! Tests should only import from this module, not from internal submodules.
//!
//! # Example
//!
//! ```no_run
//! mod common;
//! use common::{TestClient, TestServer};
//!
//! #[tokio::test]
//! async fn test_initial_queue() {
//!     let server = TestServer::spawn().await;
//!     let mut client = TestClient::connect(&server, None).await;
//!
//!     let queue = client.wait_for("queue").await.unwrap();
//!     assert_eq!(queue["payload"]["length"], 0);
//! }
//! ```

mod client;
mod constants;
mod server;

// Public API - this is what tests import
pub use client::TestClient;
pub use constants::*;
pub use server::TestServer;
