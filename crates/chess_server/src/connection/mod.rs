//! Connection handling: the socket pump, the bootstrap that wires a
//! connection to a session, and the upgrade handler used by the accept loop.

pub mod client;
mod bootstrap;
mod handler;
pub mod pump;

pub use bootstrap::SessionBootstrap;
pub use client::ClientConnection;
pub use handler::handle_connection;
