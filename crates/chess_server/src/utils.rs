//! Convenience constructors for a server backed by the in-memory registry.

use crate::{config::ServerConfig, controller::GameRegistry, server::GameServer};
use std::sync::Arc;

/// Creates a server with default configuration and a fresh [`GameRegistry`].
pub fn create_server() -> GameServer {
    create_server_with_config(ServerConfig::default())
}

/// Creates a server with `config` and a fresh [`GameRegistry`].
///
/// The registry opens unknown games on first use when
/// `config.auto_create_games` is set.
pub fn create_server_with_config(config: ServerConfig) -> GameServer {
    let registry = GameRegistry::new(config.auto_create_games);
    GameServer::new(config, Arc::new(registry))
}
