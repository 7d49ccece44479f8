//! Command-line interface handling for the chess server daemon.
//!
//! Every option here overrides the matching setting from the configuration
//! file.

use clap::Parser;
use std::path::PathBuf;

/// Command line arguments parsed from user input.
#[derive(Debug, Clone, Parser)]
#[command(name = "chessd", version, about = "WebSocket session server for two-player chess")]
pub struct CliArgs {
    /// Configuration file path
    #[arg(short, long = "config", value_name = "FILE", default_value = "config.toml")]
    pub config_path: PathBuf,

    /// Bind address (e.g., 127.0.0.1:8080)
    #[arg(short, long = "bind", value_name = "ADDRESS")]
    pub bind_address: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Output logs in JSON format
    #[arg(long)]
    pub json_logs: bool,
}
