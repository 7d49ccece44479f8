//! Chess server daemon
//!
//! Loads configuration, sets up logging and runs the session server until a
//! termination signal arrives.

mod cli;
mod config;
mod logging;
mod signals;

use anyhow::{Context, Result};
use chess_server::create_server_with_config;
use clap::Parser;
use cli::CliArgs;
use config::AppConfig;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    // Configuration is loaded before logging so the file can pick the level
    let mut config = AppConfig::load_from_file(&args.config_path).await?;
    if let Some(bind_address) = args.bind_address {
        config.server.bind_address = bind_address;
    }
    if let Some(log_level) = args.log_level {
        config.logging.level = log_level;
    }
    if args.json_logs {
        config.logging.json_format = true;
    }
    config
        .validate()
        .context("Configuration validation failed")?;

    logging::setup_logging(&config.logging)?;

    let server = create_server_with_config(config.to_server_config()?);
    info!("♟️ Chess server v{}", env!("CARGO_PKG_VERSION"));
    info!("📂 Config: {}", args.config_path.display());
    info!("  🌐 Bind address: {}", config.server.bind_address);
    info!("  👥 Max connections: {}", config.server.max_connections);

    tokio::select! {
        result = server.start() => {
            if let Err(e) = result {
                error!("❌ Server error: {}", e);
                return Err(e.into());
            }
        }
        result = signals::shutdown_signal() => {
            result.context("Failed to install signal handlers")?;
            server.shutdown().await?;
        }
    }

    info!("👋 Chess server stopped");
    Ok(())
}
