//! Server configuration types and defaults.
//!
//! Everything the server needs is passed in through [`ServerConfig`]; there is
//! no process-wide state, so tests can run several differently configured
//! servers side by side.

pub use crate::session::SessionTimeouts;

use crate::session::SessionRole;
use std::net::SocketAddr;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;

/// Configuration structure for the chess server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// The socket address to bind the server to
    pub bind_address: SocketAddr,

    /// Maximum number of concurrent connections allowed
    pub max_connections: usize,

    /// Request paths that select the session role
    pub routes: RouteConfig,

    /// Settings applied to every WebSocket upgrade
    pub upgrade: UpgradeConfig,

    /// Join and idle limits for each session
    pub session: SessionTimeouts,

    /// Whether a player joining an unknown game creates it
    pub auto_create_games: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 8080)),
            max_connections: 1000,
            routes: RouteConfig::default(),
            upgrade: UpgradeConfig::default(),
            session: SessionTimeouts::default(),
            auto_create_games: true,
        }
    }
}

/// Maps request paths to session roles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteConfig {
    pub play_path: String,
    pub spectate_path: String,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            play_path: "/play".to_string(),
            spectate_path: "/spectate".to_string(),
        }
    }
}

impl RouteConfig {
    /// Role served at `path`, ignoring any query string.
    pub fn resolve(&self, path: &str) -> Option<SessionRole> {
        let path = path.split('?').next().unwrap_or(path);
        if path == self.play_path {
            Some(SessionRole::Player)
        } else if path == self.spectate_path {
            Some(SessionRole::Spectator)
        } else {
            None
        }
    }
}

/// Limits applied to each upgraded connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeConfig {
    /// Largest accepted message in bytes (`None` for unlimited)
    pub max_message_size: Option<usize>,
    /// Largest accepted frame in bytes (`None` for unlimited)
    pub max_frame_size: Option<usize>,
    /// Outgoing bytes buffered before a flush is forced
    pub write_buffer_size: usize,
}

impl Default for UpgradeConfig {
    fn default() -> Self {
        // Envelopes are tiny; anything near these limits is not a chess client
        Self {
            max_message_size: Some(64 * 1024),
            max_frame_size: Some(16 * 1024),
            write_buffer_size: 0,
        }
    }
}

impl UpgradeConfig {
    pub fn to_websocket_config(&self) -> WebSocketConfig {
        let mut config = WebSocketConfig::default();
        config.max_message_size = self.max_message_size;
        config.max_frame_size = self.max_frame_size;
        config.write_buffer_size = self.write_buffer_size;
        config
    }
}
