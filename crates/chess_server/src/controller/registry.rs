//! In-memory game registry.
//!
//! A minimal [`GameController`] that seats two players per game, enforces
//! turn order and relays moves to everyone watching. It does not know the
//! rules of chess: any non-empty move text from the player on turn is
//! accepted. A rules engine declares the outcome through
//! [`GameRegistry::finish_game`].

use super::{ControllerError, GameController, PlayerSeat, UpdateReceiver, UpdateSender};
use crate::messaging::{
    GameId, GameResult, GameUpdate, MoveUpdate, PlayerId, PlayerJoined, PlayerLeft, SpectatorId,
    SpectatorJoin, SpectatorLeft,
};
use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::HashMap;
use tokio::sync::mpsc;
use tracing::{debug, info};

#[derive(Debug, Default)]
struct GameTable {
    /// Seated players in join order; index 0 moves first
    seats: Vec<PlayerId>,
    turn: usize,
    moves: Vec<String>,
    result: Option<GameResult>,
    players: HashMap<PlayerId, UpdateSender>,
    spectators: HashMap<SpectatorId, UpdateSender>,
    next_spectator: u64,
}

impl GameTable {
    fn is_finished(&self) -> bool {
        self.result.is_some()
    }

    fn is_abandoned(&self) -> bool {
        self.players.is_empty() && self.spectators.is_empty()
    }

    /// Sends `update` to every subscriber except `except`, dropping the ones
    /// whose session is gone.
    fn broadcast(&mut self, update: &GameUpdate, except: Option<PlayerId>) {
        self.players
            .retain(|id, tx| Some(*id) == except || tx.send(update.clone()).is_ok());
        self.spectators.retain(|_, tx| tx.send(update.clone()).is_ok());
    }

    fn finish(&mut self, result: GameResult) {
        let update = GameUpdate::Result(result.clone());
        self.result = Some(result);
        self.broadcast(&update, None);
    }
}

/// Shared registry of live games.
#[derive(Debug)]
pub struct GameRegistry {
    games: DashMap<GameId, GameTable>,
    auto_create: bool,
}

impl GameRegistry {
    /// Creates a registry. With `auto_create` set, the first player to join an
    /// unknown game creates it; otherwise games must be opened first.
    pub fn new(auto_create: bool) -> Self {
        Self {
            games: DashMap::new(),
            auto_create,
        }
    }

    /// Opens an empty game. Returns `false` if the game already exists.
    pub fn open_game(&self, game_id: GameId) -> bool {
        let mut created = false;
        self.games.entry(game_id).or_insert_with(|| {
            created = true;
            GameTable::default()
        });
        if created {
            debug!("Opened game {}", game_id);
        }
        created
    }

    /// Ends a game and delivers the result to every participant.
    pub fn finish_game(
        &self,
        game_id: GameId,
        winner: Option<PlayerId>,
        reason: impl Into<String>,
    ) -> Result<(), ControllerError> {
        let mut game = self
            .games
            .get_mut(&game_id)
            .ok_or(ControllerError::GameNotFound(game_id))?;
        if game.is_finished() {
            return Err(ControllerError::GameFinished(game_id));
        }
        let result = GameResult {
            game_id,
            winner,
            reason: reason.into(),
        };
        info!("🏁 Game {} finished: {}", game_id, result.reason);
        game.finish(result);
        Ok(())
    }

    /// Number of games currently held.
    pub fn game_count(&self) -> usize {
        self.games.len()
    }

    /// Moves played so far in a game.
    pub fn moves(&self, game_id: GameId) -> Option<Vec<String>> {
        self.games.get(&game_id).map(|game| game.moves.clone())
    }

    /// Players holding a seat in a game, in join order.
    pub fn seated(&self, game_id: GameId) -> Vec<PlayerId> {
        self.games
            .get(&game_id)
            .map(|game| game.seats.clone())
            .unwrap_or_default()
    }

    /// Number of spectators currently subscribed to a game.
    ///
    /// # Returns
    ///
    /// The subscriber count, or `0` if the game does not exist.
    pub fn spectator_count(&self, game_id: GameId) -> usize {
        self.games
            .get(&game_id)
            .map_or(0, |game| game.spectators.len())
    }

    fn forget_if_abandoned(&self, game_id: GameId) {
        let auto_create = self.auto_create;
        let removed = self.games.remove_if(&game_id, |_, game| {
            game.is_abandoned() && (game.is_finished() || (auto_create && game.seats.is_empty()))
        });
        if removed.is_some() {
            debug!("Dropped abandoned game {}", game_id);
        }
    }
}

impl Default for GameRegistry {
    fn default() -> Self {
        Self::new(true)
    }
}

#[async_trait]
impl GameController for GameRegistry {
    async fn player_join(&self, join: PlayerJoined) -> Result<UpdateReceiver, ControllerError> {
        let PlayerJoined { game_id, player_id } = join;
        // One guard from lookup to seating, so a concurrent leave cannot drop
        // the game in between
        let mut game = if self.auto_create {
            self.games.entry(game_id).or_default()
        } else {
            self.games
                .get_mut(&game_id)
                .ok_or(ControllerError::GameNotFound(game_id))?
        };

        if game.is_finished() {
            return Err(ControllerError::GameFinished(game_id));
        }
        if game.players.contains_key(&player_id) {
            return Err(ControllerError::AlreadyJoined { game_id, player_id });
        }
        if !game.seats.contains(&player_id) {
            if game.seats.len() >= 2 {
                return Err(ControllerError::GameFull(game_id));
            }
            game.seats.push(player_id);
        }

        game.broadcast(&GameUpdate::PlayerJoined(join.clone()), None);
        let (tx, rx) = mpsc::unbounded_channel();
        game.players.insert(player_id, tx);
        Ok(rx)
    }

    async fn make_move(&self, seat: PlayerSeat, mv: MoveUpdate) -> Result<(), ControllerError> {
        let PlayerSeat { game_id, player_id } = seat;
        let mut game = self
            .games
            .get_mut(&game_id)
            .ok_or(ControllerError::GameNotFound(game_id))?;

        if game.is_finished() {
            return Err(ControllerError::GameFinished(game_id));
        }
        let position = game
            .seats
            .iter()
            .position(|p| *p == player_id)
            .ok_or(ControllerError::NotSeated { game_id, player_id })?;
        if game.seats.len() < 2 {
            return Err(ControllerError::WaitingForOpponent(game_id));
        }
        if position != game.turn {
            return Err(ControllerError::NotYourTurn(player_id));
        }
        let text = mv.mv.trim();
        if text.is_empty() {
            return Err(ControllerError::IllegalMove("empty move".to_string()));
        }

        game.moves.push(text.to_string());
        game.turn = 1 - game.turn;
        let relay = GameUpdate::Move(MoveUpdate {
            mv: text.to_string(),
            player_id: Some(player_id),
        });
        game.broadcast(&relay, Some(player_id));
        Ok(())
    }

    async fn player_leave(&self, left: PlayerLeft) {
        let PlayerLeft { game_id, player_id } = left;
        {
            let Some(mut game) = self.games.get_mut(&game_id) else {
                return;
            };
            game.players.remove(&player_id);

            if !game.is_finished() && game.seats.contains(&player_id) {
                if game.seats.len() == 2 {
                    let winner = game.seats.iter().copied().find(|p| *p != player_id);
                    info!("🏳️ Player {} abandoned game {}", player_id, game_id);
                    game.finish(GameResult {
                        game_id,
                        winner,
                        reason: "opponent left".to_string(),
                    });
                } else {
                    game.seats.retain(|p| *p != player_id);
                }
            }
        }
        self.forget_if_abandoned(game_id);
    }

    async fn spectator_join(
        &self,
        join: SpectatorJoin,
    ) -> Result<(SpectatorId, UpdateReceiver), ControllerError> {
        let mut game = self
            .games
            .get_mut(&join.game_id)
            .ok_or(ControllerError::GameNotFound(join.game_id))?;

        game.next_spectator += 1;
        let spectator_id = SpectatorId(game.next_spectator);
        let (tx, rx) = mpsc::unbounded_channel();

        // A finished game has nothing left to show except its outcome
        if let Some(result) = game.result.clone() {
            let _ = tx.send(GameUpdate::Result(result));
        }
        game.spectators.insert(spectator_id, tx);
        Ok((spectator_id, rx))
    }

    async fn spectator_leave(&self, left: SpectatorLeft) {
        if let Some(mut game) = self.games.get_mut(&left.game_id) {
            game.spectators.remove(&left.spectator_id);
        }
        self.forget_if_abandoned(left.game_id);
    }
}
