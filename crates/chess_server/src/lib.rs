//! # Chess Server - Two-Player Sessions over WebSocket
//!
//! A session server for two-player chess. Each WebSocket connection becomes
//! either a **player** session, seated in a game and allowed to move, or a
//! **spectator** session that watches a game without taking part.
//!
//! ## Design Philosophy
//!
//! The server contains **no chess rules**. Seating, turn order, move
//! validation and results all belong to a [`controller::GameController`].
//! The server only provides:
//!
//! * **WebSocket connection management** - Upgrade, route and close handling
//! * **Session state machines** - Join handshake, move relay and teardown
//! * **Socket pumps** - One reader and one writer task per connection
//!
//! ## Architecture Overview
//!
//! ### Message Flow
//!
//! 1. The reader task decodes each text frame into a [`messaging::GameUpdate`]
//! 2. The session validates it against its current state
//! 3. Player moves go to the controller; controller updates go to the writer
//! 4. The writer task encodes updates onto the socket in order
//!
//! Every update travels as `{"type": ..., "data": ...}`:
//!
//! ```json
//! {"type": "player_joined_update", "data": {"game_id": 7, "player_id": 1}}
//! {"type": "move_update", "data": {"move": "e2e4"}}
//! ```
//!
//! ### Session Lifecycle
//!
//! * A player must open with `player_joined_update`, a spectator with
//!   `spectator_join_update`; anything else ends the session
//! * Once joined, the controller is always told when the session leaves,
//!   however the session ends
//! * A `result_update` ends a game; the session closes cleanly after it
//!
//! ## Configuration
//!
//! The server is configured through [`ServerConfig`]:
//!
//! * **Network settings** - Bind address and connection limit
//! * **Routes** - Upgrade paths for players and spectators
//! * **Session limits** - Join and idle timeouts
//!
//! ## Error Handling
//!
//! Server-level failures are [`ServerError`]s; the reason a single session
//! ended is a [`error::SessionError`].

pub use config::ServerConfig;
pub use error::ServerError;
pub use server::GameServer;
pub use utils::{create_server, create_server_with_config};

pub mod config;
pub mod connection;
pub mod controller;
pub mod error;
pub mod messaging;
pub mod server;
pub mod session;
pub mod utils;
