//! Player session: join, then alternate between relaying game updates to the
//! client and submitting the client's moves to the controller.

use super::{await_join, forward, idle, LeaveGuard, LeaveNotice, SessionEnd, SessionIo, SessionTimeouts};
use crate::controller::{GameController, PlayerSeat, UpdateReceiver};
use crate::error::SessionError;
use crate::messaging::{GameUpdate, PlayerLeft, UpdateKind};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Runs a player session until the game ends, the client leaves, or an error
/// terminates it.
///
/// The first inbound message must be `player_joined_update`. If the join is
/// accepted, the controller is told the player left before this returns,
/// whatever the outcome. A rejected join ends the session without a leave.
pub async fn run_player_session(
    controller: Arc<dyn GameController>,
    mut io: SessionIo,
    timeouts: &SessionTimeouts,
) -> Result<SessionEnd, SessionError> {
    let join = match await_join(
        &mut io.inbound,
        UpdateKind::PlayerJoined,
        timeouts.join,
        |update| match update {
            GameUpdate::PlayerJoined(join) => Some(join),
            _ => None,
        },
    )
    .await
    {
        Ok(join) => join,
        Err(e @ SessionError::Connection(_)) => {
            debug!("Connection ended before join update: {}", e);
            return Err(e);
        }
        Err(e) => {
            warn!("Failed to receive join update: {}", e);
            return Err(e);
        }
    };

    let seat = PlayerSeat {
        game_id: join.game_id,
        player_id: join.player_id,
    };
    let updates = match controller.player_join(join).await {
        Ok(updates) => updates,
        Err(e) => {
            warn!(
                "Could not join game {} as player {}: {}",
                seat.game_id, seat.player_id, e
            );
            return Err(e.into());
        }
    };
    info!("👋 Player {} joined game {}", seat.player_id, seat.game_id);

    let membership = LeaveGuard::new(
        controller.clone(),
        LeaveNotice::Player(PlayerLeft {
            game_id: seat.game_id,
            player_id: seat.player_id,
        }),
    );
    let outcome = play(controller.as_ref(), seat, updates, &mut io, timeouts.idle).await;
    membership.release().await;

    match &outcome {
        Ok(end) => info!(
            "Player {} left game {}: {:?}",
            seat.player_id, seat.game_id, end
        ),
        Err(e @ SessionError::Connection(_)) => error!(
            "Player {} in game {} lost: {}",
            seat.player_id, seat.game_id, e
        ),
        Err(e) => warn!(
            "Player {} removed from game {}: {}",
            seat.player_id, seat.game_id, e
        ),
    }
    outcome
}

async fn play(
    controller: &dyn GameController,
    seat: PlayerSeat,
    mut updates: UpdateReceiver,
    io: &mut SessionIo,
    idle_limit: Option<Duration>,
) -> Result<SessionEnd, SessionError> {
    loop {
        tokio::select! {
            update = updates.recv() => {
                let update = update.ok_or_else(|| {
                    SessionError::Connection("controller closed the update channel".to_string())
                })?;
                let terminal = update.is_terminal();
                forward(&io.outbound, update).await?;
                if terminal {
                    return Ok(SessionEnd::Completed);
                }
            }
            message = io.inbound.recv() => match message {
                None => {
                    return Err(SessionError::Connection("client channel closed".to_string()));
                }
                Some(GameUpdate::Eof) => return Ok(SessionEnd::ClientDisconnected),
                // TODO: accept resign and draw offers once the controller exposes them
                Some(GameUpdate::Move(mv)) => {
                    info!("♟️ Player {} entered move {}", seat.player_id, mv.mv);
                    controller.make_move(seat, mv).await?;
                }
                Some(other) => {
                    return Err(SessionError::UnexpectedMessage {
                        expected: UpdateKind::Move,
                        received: other.kind(),
                    });
                }
            },
            _ = idle(idle_limit) => {
                return Err(SessionError::Timeout(idle_limit.unwrap_or_default()));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::ControllerError;
    use crate::messaging::{
        GameId, GameResult, MoveUpdate, PlayerId, PlayerJoined, SpectatorJoin,
    };
    use crate::session::testing::{Call, RecordingController};
    use tokio::sync::mpsc;
    use tokio::task::JoinHandle;

    type Session = JoinHandle<Result<SessionEnd, SessionError>>;

    fn spawn_session(
        controller: Arc<RecordingController>,
        timeouts: SessionTimeouts,
    ) -> (mpsc::Sender<GameUpdate>, mpsc::Receiver<GameUpdate>, Session) {
        let (in_tx, in_rx) = mpsc::channel(1);
        let (out_tx, out_rx) = mpsc::channel(1);
        let io = SessionIo {
            inbound: in_rx,
            outbound: out_tx,
        };
        let handle = tokio::spawn(async move { run_player_session(controller, io, &timeouts).await });
        (in_tx, out_rx, handle)
    }

    async fn wait_for_calls(controller: &RecordingController, count: usize) {
        for _ in 0..200 {
            if controller.calls().len() >= count {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("expected {count} calls, saw {:?}", controller.calls());
    }

    fn joined() -> GameUpdate {
        GameUpdate::PlayerJoined(PlayerJoined {
            game_id: GameId(1),
            player_id: PlayerId(7),
        })
    }

    fn seat() -> PlayerSeat {
        PlayerSeat {
            game_id: GameId(1),
            player_id: PlayerId(7),
        }
    }

    fn left() -> Call {
        Call::PlayerLeave(PlayerLeft {
            game_id: GameId(1),
            player_id: PlayerId(7),
        })
    }

    fn result() -> GameUpdate {
        GameUpdate::Result(GameResult {
            game_id: GameId(1),
            winner: Some(PlayerId(7)),
            reason: "checkmate".to_string(),
        })
    }

    #[tokio::test]
    async fn test_join_move_result_then_leave() {
        let controller = Arc::new(RecordingController::default());
        let (client, mut writer, session) =
            spawn_session(controller.clone(), SessionTimeouts::default());

        client.send(joined()).await.unwrap();
        client
            .send(GameUpdate::Move(MoveUpdate::new("e2e4")))
            .await
            .unwrap();
        wait_for_calls(&controller, 2).await;

        controller.update_sender().send(result()).unwrap();
        assert_eq!(writer.recv().await, Some(result()));

        assert_eq!(session.await.unwrap().unwrap(), SessionEnd::Completed);
        assert_eq!(
            controller.calls(),
            vec![
                Call::PlayerJoin(PlayerJoined {
                    game_id: GameId(1),
                    player_id: PlayerId(7),
                }),
                Call::MakeMove(seat(), MoveUpdate::new("e2e4")),
                left(),
            ]
        );
    }

    #[tokio::test]
    async fn test_moves_reach_controller_in_order_and_stop_at_result() {
        let controller = Arc::new(RecordingController::default());
        let (client, mut writer, session) =
            spawn_session(controller.clone(), SessionTimeouts::default());

        client.send(joined()).await.unwrap();
        let moves = ["e2e4", "g1f3", "f1c4"];
        for mv in moves {
            client
                .send(GameUpdate::Move(MoveUpdate::new(mv)))
                .await
                .unwrap();
        }
        wait_for_calls(&controller, 1 + moves.len()).await;

        // Fill the writer slot so the session blocks delivering the result
        let updates = controller.update_sender();
        let reply = GameUpdate::Move(MoveUpdate {
            mv: "e7e5".to_string(),
            player_id: Some(PlayerId(8)),
        });
        updates.send(reply.clone()).unwrap();
        updates.send(result()).unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        // Queued behind the result; must never be submitted
        client
            .send(GameUpdate::Move(MoveUpdate::new("d2d4")))
            .await
            .unwrap();

        assert_eq!(writer.recv().await, Some(reply));
        assert_eq!(writer.recv().await, Some(result()));
        assert_eq!(session.await.unwrap().unwrap(), SessionEnd::Completed);

        let calls = controller.calls();
        let submitted: Vec<Call> = calls
            .iter()
            .filter(|call| matches!(call, Call::MakeMove(..)))
            .cloned()
            .collect();
        assert_eq!(
            submitted,
            moves
                .iter()
                .map(|mv| Call::MakeMove(seat(), MoveUpdate::new(*mv)))
                .collect::<Vec<_>>()
        );
        assert_eq!(calls.last(), Some(&left()));
    }

    #[tokio::test]
    async fn test_eof_before_join_is_a_quiet_disconnect() {
        let controller = Arc::new(RecordingController::default());
        let (client, _writer, session) =
            spawn_session(controller.clone(), SessionTimeouts::default());

        client.send(GameUpdate::Eof).await.unwrap();

        let err = session.await.unwrap().unwrap_err();
        assert!(matches!(err, SessionError::Connection(_)));
        assert!(!err.is_protocol_violation());
        assert!(controller.calls().is_empty());
    }

    #[tokio::test]
    async fn test_move_as_first_message_is_a_protocol_violation() {
        let controller = Arc::new(RecordingController::default());
        let (client, _writer, session) =
            spawn_session(controller.clone(), SessionTimeouts::default());

        client
            .send(GameUpdate::Move(MoveUpdate::new("e2e4")))
            .await
            .unwrap();

        let err = session.await.unwrap().unwrap_err();
        assert!(err.is_protocol_violation());
        assert!(matches!(
            err,
            SessionError::UnexpectedMessage {
                expected: UpdateKind::PlayerJoined,
                received: UpdateKind::Move,
            }
        ));
        assert!(controller.calls().is_empty());
    }

    #[tokio::test]
    async fn test_rejected_join_never_leaves() {
        let controller = Arc::new(RecordingController {
            reject_join: Some(ControllerError::GameFull(GameId(1))),
            ..Default::default()
        });
        let (client, _writer, session) =
            spawn_session(controller.clone(), SessionTimeouts::default());

        client.send(joined()).await.unwrap();

        let err = session.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            SessionError::Rejected(ControllerError::GameFull(GameId(1)))
        ));
        tokio::task::yield_now().await;
        assert_eq!(controller.calls().len(), 1);
        assert!(!controller.calls().contains(&left()));
    }

    #[tokio::test]
    async fn test_rejected_move_still_leaves() {
        let controller = Arc::new(RecordingController {
            reject_move: Some(ControllerError::NotYourTurn(PlayerId(7))),
            ..Default::default()
        });
        let (client, _writer, session) =
            spawn_session(controller.clone(), SessionTimeouts::default());

        client.send(joined()).await.unwrap();
        client
            .send(GameUpdate::Move(MoveUpdate::new("e7e5")))
            .await
            .unwrap();

        let err = session.await.unwrap().unwrap_err();
        assert!(matches!(err, SessionError::Rejected(ControllerError::NotYourTurn(_))));
        assert_eq!(controller.calls().last(), Some(&left()));
    }

    #[tokio::test]
    async fn test_eof_ends_session_quietly() {
        let controller = Arc::new(RecordingController::default());
        let (client, _writer, session) =
            spawn_session(controller.clone(), SessionTimeouts::default());

        client.send(joined()).await.unwrap();
        client.send(GameUpdate::Eof).await.unwrap();

        assert_eq!(
            session.await.unwrap().unwrap(),
            SessionEnd::ClientDisconnected
        );
        let calls = controller.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(calls[1], left());
    }

    #[tokio::test]
    async fn test_non_move_while_active_is_a_protocol_violation() {
        let controller = Arc::new(RecordingController::default());
        let (client, _writer, session) =
            spawn_session(controller.clone(), SessionTimeouts::default());

        client.send(joined()).await.unwrap();
        client
            .send(GameUpdate::SpectatorJoin(SpectatorJoin { game_id: GameId(1) }))
            .await
            .unwrap();

        let err = session.await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            SessionError::UnexpectedMessage {
                expected: UpdateKind::Move,
                received: UpdateKind::SpectatorJoin,
            }
        ));
        assert!(!controller
            .calls()
            .iter()
            .any(|call| matches!(call, Call::MakeMove(..))));
        assert_eq!(controller.calls().last(), Some(&left()));
    }

    #[tokio::test]
    async fn test_updates_are_forwarded_in_order() {
        let controller = Arc::new(RecordingController::default());
        let (client, mut writer, session) =
            spawn_session(controller.clone(), SessionTimeouts::default());

        client.send(joined()).await.unwrap();
        wait_for_calls(&controller, 1).await;

        let updates = controller.update_sender();
        let moves = ["e2e4", "e7e5", "g1f3"];
        for mv in moves {
            updates
                .send(GameUpdate::Move(MoveUpdate {
                    mv: mv.to_string(),
                    player_id: Some(PlayerId(8)),
                }))
                .unwrap();
        }
        updates.send(result()).unwrap();
        // Nothing after the result may reach the client
        updates
            .send(GameUpdate::Move(MoveUpdate::new("b8c6")))
            .unwrap();

        for mv in moves {
            match writer.recv().await {
                Some(GameUpdate::Move(update)) => assert_eq!(update.mv, mv),
                other => panic!("expected move {mv}, got {other:?}"),
            }
        }
        assert_eq!(writer.recv().await, Some(result()));
        assert_eq!(session.await.unwrap().unwrap(), SessionEnd::Completed);
        assert_eq!(writer.recv().await, None);
    }

    #[tokio::test]
    async fn test_writer_gone_terminates_session() {
        let controller = Arc::new(RecordingController::default());
        let (client, writer, session) =
            spawn_session(controller.clone(), SessionTimeouts::default());

        client.send(joined()).await.unwrap();
        wait_for_calls(&controller, 1).await;
        drop(writer);

        controller
            .update_sender()
            .send(GameUpdate::Move(MoveUpdate::new("e2e4")))
            .unwrap();

        let err = session.await.unwrap().unwrap_err();
        assert!(matches!(err, SessionError::Connection(_)));
        assert_eq!(controller.calls().last(), Some(&left()));
    }

    #[tokio::test]
    async fn test_controller_dropping_channel_terminates_session() {
        let controller = Arc::new(RecordingController::default());
        let (client, _writer, session) =
            spawn_session(controller.clone(), SessionTimeouts::default());

        client.send(joined()).await.unwrap();
        wait_for_calls(&controller, 1).await;
        controller.updates.lock().unwrap().take();

        let err = session.await.unwrap().unwrap_err();
        assert!(matches!(err, SessionError::Connection(_)));
        assert_eq!(controller.calls().last(), Some(&left()));
    }

    #[tokio::test]
    async fn test_join_timeout() {
        let controller = Arc::new(RecordingController::default());
        let timeouts = SessionTimeouts {
            join: Some(Duration::from_millis(20)),
            idle: None,
        };
        let (_client, _writer, session) = spawn_session(controller.clone(), timeouts);

        let err = session.await.unwrap().unwrap_err();
        assert!(matches!(err, SessionError::Timeout(_)));
        assert!(controller.calls().is_empty());
    }

    #[tokio::test]
    async fn test_idle_timeout_still_leaves() {
        let controller = Arc::new(RecordingController::default());
        let timeouts = SessionTimeouts {
            join: None,
            idle: Some(Duration::from_millis(30)),
        };
        let (client, _writer, session) = spawn_session(controller.clone(), timeouts);

        client.send(joined()).await.unwrap();

        let err = session.await.unwrap().unwrap_err();
        assert!(matches!(err, SessionError::Timeout(_)));
        assert_eq!(controller.calls().last(), Some(&left()));
    }
}
