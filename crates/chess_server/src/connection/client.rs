//! Client connection representation.

use crate::session::SessionRole;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Represents an individual client connection to the server.
///
/// Tracks the essentials for logging a connection's lifetime: where it came
/// from, which route it upgraded on, and when it was accepted.
#[derive(Debug, Clone)]
pub struct ClientConnection {
    /// The remote network address of the client
    pub remote_addr: SocketAddr,

    /// Role selected by the upgrade route
    pub role: SessionRole,

    /// When this connection was established
    pub connected_at: Instant,
}

impl ClientConnection {
    pub fn new(remote_addr: SocketAddr, role: SessionRole) -> Self {
        Self {
            remote_addr,
            role,
            connected_at: Instant::now(),
        }
    }

    /// Label used in log lines, e.g. `player@127.0.0.1:50312`.
    pub fn label(&self) -> String {
        format!("{}@{}", self.role, self.remote_addr)
    }

    pub fn elapsed(&self) -> Duration {
        self.connected_at.elapsed()
    }
}
