use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::{Arc, Weak};
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use player_relay::config::{AppConfig, CliConfig, FileConfig};
use player_relay::player::{InMemoryPlayer, PlayerEvents};
use player_relay::server::websocket::{Relay, RelayContext};
use player_relay::server::{metrics, run_metrics_server, HttpServer};
use player_relay::RequestsLoggingLevel;

fn parse_path(s: &str) -> Result<PathBuf> {
    let path_buf = PathBuf::from(s);
    let original_path = match path_buf.canonicalize() {
        Ok(path) => path,
        Err(msg) => {
            if msg.kind() == std::io::ErrorKind::NotFound {
                path_buf
            } else {
                return Err(msg).with_context(|| format!("Error resolving path: {}", s));
            }
        }
    };
    if original_path.is_absolute() {
        return Ok(original_path);
    }
    let cwd = std::env::current_dir()?;
    Ok(cwd.join(original_path))
}

#[derive(Parser, Debug)]
struct CliArgs {
    /// Path to a TOML config file. Its values override the command line.
    #[clap(long, value_parser = parse_path)]
    pub config: Option<PathBuf>,

    /// The port to listen on.
    #[clap(short, long, default_value_t = 3001)]
    pub port: u16,

    /// The port to expose Prometheus metrics on.
    #[clap(long, default_value_t = 9091)]
    pub metrics_port: u16,

    /// The level of logging to perform on each request.
    #[clap(long, default_value = "path")]
    pub logging_level: RequestsLoggingLevel,

    /// Maximum number of queue entries sent to clients in each queue update.
    #[clap(long, default_value_t = 100)]
    pub sent_queue_limit: usize,

    /// Event that requires an authenticated connection. Can be repeated.
    #[clap(long = "protected-path")]
    pub protected_paths: Vec<String>,

    /// JSON file with the songs the player can find through search.
    #[clap(long, value_parser = parse_path)]
    pub library: Option<PathBuf>,
}

impl CliArgs {
    fn to_cli_config(&self) -> CliConfig {
        CliConfig {
            port: self.port,
            metrics_port: self.metrics_port,
            logging_level: self.logging_level.clone(),
            sent_queue_limit: self.sent_queue_limit,
            protected_paths: self.protected_paths.clone(),
            library_path: self.library.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli_args = CliArgs::parse();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .with_env_var("LOG_LEVEL")
                .from_env_lossy(),
        )
        .init();

    let file_config = match &cli_args.config {
        Some(path) => Some(FileConfig::load(path)?),
        None => None,
    };
    let config = AppConfig::resolve(&cli_args.to_cli_config(), file_config)?;

    metrics::init_metrics();

    let library = match &config.library_path {
        Some(path) => InMemoryPlayer::load_library(path)?,
        None => Vec::new(),
    };
    info!("Loaded {} library songs", library.len());
    let player = Arc::new(InMemoryPlayer::new(library));

    let mut http = HttpServer::new(config.server_config());
    let relay = Relay::attach(
        RelayContext::new(player.clone()).with_config(config.relay_config()),
        Some(&mut http),
    )?;
    let events: Weak<dyn PlayerEvents> = Arc::downgrade(&relay) as Weak<dyn PlayerEvents>;
    player.add_listener(events);

    let metrics_port = config.metrics_port;
    tokio::spawn(async move {
        if let Err(e) = run_metrics_server(metrics_port).await {
            error!("Metrics server stopped: {}", e);
        }
    });

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", config.port))
        .await
        .with_context(|| format!("Could not bind port {}", config.port))?;
    info!("Ready to serve at port {}!", config.port);
    http.serve(listener).await
}
