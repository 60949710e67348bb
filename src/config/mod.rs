mod file_config;

pub use file_config::FileConfig;

use crate::server::websocket::{msg_types, RelayConfig};
use crate::server::{RequestsLoggingLevel, ServerConfig};
use anyhow::{bail, Result};
use clap::ValueEnum;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use tracing::warn;

/// CLI arguments that can be used for config resolution.
/// This struct mirrors the CLI arguments that can be overridden by TOML config.
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub sent_queue_limit: usize,
    pub protected_paths: Vec<String>,
    pub library_path: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub port: u16,
    pub metrics_port: u16,
    pub logging_level: RequestsLoggingLevel,
    pub library_path: Option<PathBuf>,
    pub sent_queue_limit: usize,
    /// `None` when no event is protected.
    pub protected_paths: Option<HashSet<String>>,
    pub session_tokens: HashMap<String, String>,
}

impl AppConfig {
    /// Resolve configuration from CLI arguments and optional TOML file config.
    /// TOML values override CLI values where present.
    pub fn resolve(cli: &CliConfig, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let port = file.port.unwrap_or(cli.port);
        let metrics_port = file.metrics_port.unwrap_or(cli.metrics_port);

        let logging_level = file
            .logging_level
            .and_then(|s| parse_logging_level(&s))
            .unwrap_or_else(|| cli.logging_level.clone());

        let library_path = file
            .library_path
            .map(PathBuf::from)
            .or_else(|| cli.library_path.clone());
        if let Some(path) = &library_path {
            if !path.is_file() {
                bail!("Library file does not exist: {:?}", path);
            }
        }

        let sent_queue_limit = file.sent_queue_limit.unwrap_or(cli.sent_queue_limit);
        if sent_queue_limit == 0 {
            bail!("sent_queue_limit must be greater than zero");
        }

        let protected_paths = file
            .protected_paths
            .unwrap_or_else(|| cli.protected_paths.clone());
        for path in &protected_paths {
            if !msg_types::INBOUND.contains(&path.as_str()) {
                warn!("Protected path {} is not a known event, it will never match", path);
            }
        }
        let protected_paths = if protected_paths.is_empty() {
            None
        } else {
            Some(protected_paths.into_iter().collect())
        };

        let session_tokens = file.sessions.unwrap_or_default();

        Ok(Self {
            port,
            metrics_port,
            logging_level,
            library_path,
            sent_queue_limit,
            protected_paths,
            session_tokens,
        })
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig {
            requests_logging_level: self.logging_level.clone(),
            port: self.port,
            session_tokens: self.session_tokens.clone(),
        }
    }

    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            sent_queue_limit: self.sent_queue_limit,
            protected_paths: self.protected_paths.clone(),
        }
    }
}

/// Parses a logging level string into RequestsLoggingLevel.
/// Uses clap's ValueEnum trait for parsing.
fn parse_logging_level(s: &str) -> Option<RequestsLoggingLevel> {
    RequestsLoggingLevel::from_str(s, true).ok()
}
