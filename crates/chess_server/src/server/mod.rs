//! Accept loop and server lifecycle.

mod core;

pub use self::core::GameServer;
