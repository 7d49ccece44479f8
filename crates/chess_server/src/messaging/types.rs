//! Message type definitions for client-server communication.
//!
//! Every frame exchanged with a client carries exactly one [`GameUpdate`].
//! On the wire an update is a JSON object tagged with its kind:
//!
//! ```json
//! { "type": "player_joined_update", "data": { "game_id": 1, "player_id": 7 } }
//! ```
//!
//! The kind is derived from the enum variant, so a tag that disagrees with its
//! payload cannot be represented.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a single game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GameId(pub u64);

/// Identifier of a player, assigned outside this server (matchmaking).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub u64);

/// Opaque identifier handed out by the controller when a spectator joins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SpectatorId(pub u64);

impl fmt::Display for GameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for SpectatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// First message of a player session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerJoined {
    pub game_id: GameId,
    pub player_id: PlayerId,
}

/// Synthesized when a player session ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerLeft {
    pub game_id: GameId,
    pub player_id: PlayerId,
}

/// First message of a spectator session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpectatorJoin {
    pub game_id: GameId,
}

/// Synthesized when a spectator session ends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpectatorLeft {
    pub game_id: GameId,
    pub spectator_id: SpectatorId,
}

/// A move in whatever notation the rules engine understands (e.g. `"e2e4"`).
///
/// Clients send only the move text. When the controller relays a move to the
/// other participants it fills in `player_id` with the mover.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveUpdate {
    #[serde(rename = "move")]
    pub mv: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<PlayerId>,
}

impl MoveUpdate {
    /// Creates a move as a client sends it, without a mover attached.
    ///
    /// # Arguments
    ///
    /// * `mv` - The move text, e.g. `"e2e4"`
    pub fn new(mv: impl Into<String>) -> Self {
        Self {
            mv: mv.into(),
            player_id: None,
        }
    }
}

/// Terminal update: the game is over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameResult {
    pub game_id: GameId,
    /// `None` for a draw or an aborted game
    #[serde(default)]
    pub winner: Option<PlayerId>,
    pub reason: String,
}

/// One envelope exchanged between a client and its session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GameUpdate {
    #[serde(rename = "player_joined_update")]
    PlayerJoined(PlayerJoined),
    #[serde(rename = "player_left_update")]
    PlayerLeft(PlayerLeft),
    #[serde(rename = "spectator_join_update")]
    SpectatorJoin(SpectatorJoin),
    #[serde(rename = "spectator_left_update")]
    SpectatorLeft(SpectatorLeft),
    #[serde(rename = "move_update")]
    Move(MoveUpdate),
    #[serde(rename = "result_update")]
    Result(GameResult),
    /// The connection is closed. Never carries a payload.
    #[serde(rename = "EOF")]
    Eof,
}

/// Discriminant of a [`GameUpdate`], used for dispatch and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateKind {
    PlayerJoined,
    PlayerLeft,
    SpectatorJoin,
    SpectatorLeft,
    Move,
    Result,
    Eof,
}

impl UpdateKind {
    /// The tag used for this kind on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            UpdateKind::PlayerJoined => "player_joined_update",
            UpdateKind::PlayerLeft => "player_left_update",
            UpdateKind::SpectatorJoin => "spectator_join_update",
            UpdateKind::SpectatorLeft => "spectator_left_update",
            UpdateKind::Move => "move_update",
            UpdateKind::Result => "result_update",
            UpdateKind::Eof => "EOF",
        }
    }
}

impl fmt::Display for UpdateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl GameUpdate {
    pub fn kind(&self) -> UpdateKind {
        match self {
            GameUpdate::PlayerJoined(_) => UpdateKind::PlayerJoined,
            GameUpdate::PlayerLeft(_) => UpdateKind::PlayerLeft,
            GameUpdate::SpectatorJoin(_) => UpdateKind::SpectatorJoin,
            GameUpdate::SpectatorLeft(_) => UpdateKind::SpectatorLeft,
            GameUpdate::Move(_) => UpdateKind::Move,
            GameUpdate::Result(_) => UpdateKind::Result,
            GameUpdate::Eof => UpdateKind::Eof,
        }
    }

    /// Whether a session must end after delivering this update.
    pub fn is_terminal(&self) -> bool {
        matches!(self, GameUpdate::Result(_))
    }
}
