//! Contract between sessions and the service that owns game state.
//!
//! Sessions never touch game state directly. They call a [`GameController`],
//! which decides whether a join or move is acceptable and pushes
//! [`GameUpdate`]s back through the per-session channel it hands out on join.
//! One controller is shared by every session on the server, so
//! implementations must tolerate concurrent calls.

mod registry;

pub use registry::GameRegistry;

use crate::messaging::{
    GameId, GameUpdate, MoveUpdate, PlayerId, PlayerJoined, PlayerLeft, SpectatorId,
    SpectatorJoin, SpectatorLeft,
};
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

/// Receiving side of the per-session update channel.
pub type UpdateReceiver = mpsc::UnboundedReceiver<GameUpdate>;

/// Sending side of the per-session update channel, held by the controller.
pub type UpdateSender = mpsc::UnboundedSender<GameUpdate>;

/// A player bound to a game by a successful join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlayerSeat {
    pub game_id: GameId,
    pub player_id: PlayerId,
}

/// Domain rejections returned by a controller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControllerError {
    #[error("Game {0} not found")]
    GameNotFound(GameId),
    #[error("Game {0} is full")]
    GameFull(GameId),
    #[error("Player {player_id} already joined game {game_id}")]
    AlreadyJoined { game_id: GameId, player_id: PlayerId },
    #[error("Player {player_id} is not seated in game {game_id}")]
    NotSeated { game_id: GameId, player_id: PlayerId },
    #[error("Illegal move: {0}")]
    IllegalMove(String),
    #[error("It is not player {0}'s turn")]
    NotYourTurn(PlayerId),
    #[error("Game {0} is waiting for an opponent")]
    WaitingForOpponent(GameId),
    #[error("Game {0} is already finished")]
    GameFinished(GameId),
}

/// Game and matchmaking operations a session calls.
#[async_trait]
pub trait GameController: Send + Sync {
    /// Seats a player and returns the channel that will carry this player's updates.
    async fn player_join(&self, join: PlayerJoined) -> Result<UpdateReceiver, ControllerError>;

    /// Applies a move on behalf of a seated player.
    async fn make_move(&self, seat: PlayerSeat, mv: MoveUpdate) -> Result<(), ControllerError>;

    /// Releases a seat. Best effort.
    async fn player_leave(&self, left: PlayerLeft);

    /// Registers a spectator and returns its id and update channel.
    async fn spectator_join(
        &self,
        join: SpectatorJoin,
    ) -> Result<(SpectatorId, UpdateReceiver), ControllerError>;

    /// Unregisters a spectator. Best effort.
    async fn spectator_leave(&self, left: SpectatorLeft);
}
