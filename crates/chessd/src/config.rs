//! Configuration management for the chess server daemon.
//!
//! This module handles loading, validation, and conversion of server
//! configuration from TOML files.

use anyhow::{anyhow, bail, Context, Result};
use chess_server::config::{RouteConfig, SessionTimeouts, UpgradeConfig};
use chess_server::ServerConfig;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::info;

/// Application configuration loaded from TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration settings
    pub server: ServerSettings,
    /// Upgrade paths for each session role
    pub routes: RouteSettings,
    /// Join and idle limits
    pub session: SessionSettings,
    /// WebSocket frame limits
    pub websocket: WebSocketSettings,
    /// Logging configuration settings
    pub logging: LoggingSettings,
}

/// Network binding and connection limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    /// Network address to bind the server to (e.g., "127.0.0.1:8080")
    pub bind_address: String,
    /// Maximum number of concurrent client connections
    pub max_connections: usize,
    /// Whether the first player to join an unknown game creates it
    pub auto_create_games: bool,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
            max_connections: 1000,
            auto_create_games: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteSettings {
    pub play_path: String,
    pub spectate_path: String,
}

impl Default for RouteSettings {
    fn default() -> Self {
        let routes = RouteConfig::default();
        Self {
            play_path: routes.play_path,
            spectate_path: routes.spectate_path,
        }
    }
}

/// Session limits in seconds. Zero disables a limit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionSettings {
    pub join_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

impl Default for SessionSettings {
    fn default() -> Self {
        let timeouts = SessionTimeouts::default();
        Self {
            join_timeout_secs: timeouts.join.map_or(0, |d| d.as_secs()),
            idle_timeout_secs: timeouts.idle.map_or(0, |d| d.as_secs()),
        }
    }
}

/// Frame limits in bytes. Zero means unlimited.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSocketSettings {
    pub max_message_size: usize,
    pub max_frame_size: usize,
}

impl Default for WebSocketSettings {
    fn default() -> Self {
        let upgrade = UpgradeConfig::default();
        Self {
            max_message_size: upgrade.max_message_size.unwrap_or(0),
            max_frame_size: upgrade.max_frame_size.unwrap_or(0),
        }
    }
}

/// Logging system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    pub json_format: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

fn seconds(value: u64) -> Option<Duration> {
    (value > 0).then(|| Duration::from_secs(value))
}

fn bytes(value: usize) -> Option<usize> {
    (value > 0).then_some(value)
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, writes the default configuration there and
    /// returns it.
    pub async fn load_from_file(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            toml::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Checks the configuration for values the server cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.server.bind_address.parse::<SocketAddr>().is_err() {
            bail!("Invalid bind address: {}", self.server.bind_address);
        }
        if self.server.max_connections == 0 {
            bail!("max_connections must be at least 1");
        }
        if self.server.max_connections > Semaphore::MAX_PERMITS {
            bail!(
                "max_connections must not exceed {}",
                Semaphore::MAX_PERMITS
            );
        }

        for path in [&self.routes.play_path, &self.routes.spectate_path] {
            if !path.starts_with('/') {
                bail!("Route {path:?} must start with '/'");
            }
        }
        if self.routes.play_path == self.routes.spectate_path {
            bail!("Play and spectate routes must differ");
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            bail!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                self.logging.level
            );
        }

        Ok(())
    }

    /// Converts the file configuration into the library's [`ServerConfig`].
    pub fn to_server_config(&self) -> Result<ServerConfig> {
        let bind_address = self
            .server
            .bind_address
            .parse()
            .map_err(|e| anyhow!("Failed to parse bind address: {e}"))?;

        Ok(ServerConfig {
            bind_address,
            max_connections: self.server.max_connections,
            routes: RouteConfig {
                play_path: self.routes.play_path.clone(),
                spectate_path: self.routes.spectate_path.clone(),
            },
            upgrade: UpgradeConfig {
                max_message_size: bytes(self.websocket.max_message_size),
                max_frame_size: bytes(self.websocket.max_frame_size),
                ..UpgradeConfig::default()
            },
            session: SessionTimeouts {
                join: seconds(self.session.join_timeout_secs),
                idle: seconds(self.session.idle_timeout_secs),
            },
            auto_create_games: self.server.auto_create_games,
        })
    }
}
