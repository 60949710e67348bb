use super::constants::*;
use player_relay::player::{InMemoryPlayer, PlayerEvents, Song};
use player_relay::server::websocket::{Relay, RelayConfig, RelayContext};
use player_relay::server::{HttpServer, RequestsLoggingLevel, ServerConfig};
use std::collections::HashMap;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::net::TcpListener;

/// Songs the test player can find through search.
pub fn test_library() -> Vec<Song> {
    vec![
        Song::new(SONG_1_ID, BACKEND, "mp3", 245_000)
            .with_field("title", "Blue Monday")
            .with_field("artist", "New Order"),
        Song::new(SONG_2_ID, BACKEND, "flac", 337_000)
            .with_field("title", "Blue in Green")
            .with_field("artist", "Miles Davis"),
        Song::new(SONG_3_ID, BACKEND, "mp3", 180_000)
            .with_field("title", "Red Rain")
            .with_field("artist", "Peter Gabriel"),
    ]
}

/// Test server instance that runs on a random port
///
/// The server is automatically shut down when this struct is dropped.
pub struct TestServer {
    /// Base URL for HTTP requests (e.g., "http://127.0.0.1:12345")
    pub base_url: String,

    /// Port number the server is listening on
    pub port: u16,

    /// The engine behind the relay, for inspecting state directly
    pub player: Arc<InMemoryPlayer>,

    // Keeps the relay registered as a player listener
    _relay: Arc<Relay>,
    _shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl TestServer {
    /// Spawns a server with the default relay configuration
    pub async fn spawn() -> Self {
        Self::spawn_with(RelayConfig::default()).await
    }

    /// Spawns a server with the given relay configuration
    ///
    /// The server knows a single session, [`TEST_TOKEN`] for [`TEST_USER`].
    pub async fn spawn_with(relay_config: RelayConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to random port");

        let port = listener
            .local_addr()
            .expect("Failed to get local address")
            .port();

        let base_url = format!("http://127.0.0.1:{}", port);

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let config = ServerConfig {
            port,
            requests_logging_level: RequestsLoggingLevel::None,
            session_tokens: HashMap::from([(TEST_TOKEN.to_string(), TEST_USER.to_string())]),
        };

        let player = Arc::new(InMemoryPlayer::new(test_library()));
        let mut http = HttpServer::new(config);
        let relay = Relay::attach(
            RelayContext::new(player.clone()).with_config(relay_config),
            Some(&mut http),
        )
        .expect("Failed to attach relay");
        player.add_listener(Arc::downgrade(&relay) as Weak<dyn PlayerEvents>);

        let app = http.into_router();

        // Spawn server in background task with graceful shutdown
        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await
                .expect("Server failed");
        });

        let server = Self {
            base_url,
            port,
            player,
            _relay: relay,
            _shutdown_tx: Some(shutdown_tx),
        };

        server.wait_for_ready().await;

        server
    }

    pub fn ws_url(&self) -> String {
        format!("ws://127.0.0.1:{}/socket", self.port)
    }

    /// Waits for the server to become ready by polling the status endpoint
    async fn wait_for_ready(&self) {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(100))
            .build()
            .expect("Failed to build reqwest client");

        let start = std::time::Instant::now();
        let timeout = Duration::from_millis(SERVER_READY_TIMEOUT_MS);

        loop {
            if start.elapsed() > timeout {
                panic!(
                    "Server did not become ready within {}ms",
                    SERVER_READY_TIMEOUT_MS
                );
            }

            match client.get(format!("{}/", self.base_url)).send().await {
                Ok(response) if response.status().is_success() => return,
                _ => {
                    tokio::time::sleep(Duration::from_millis(SERVER_READY_POLL_INTERVAL_MS)).await;
                }
            }
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self._shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}
