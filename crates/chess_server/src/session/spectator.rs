//! Spectator session: join, then relay game updates until the game ends or
//! the client disconnects. Spectators cannot act, so anything they send other
//! than a disconnect is ignored.

use super::{await_join, forward, idle, LeaveGuard, LeaveNotice, SessionEnd, SessionIo, SessionTimeouts};
use crate::controller::{GameController, UpdateReceiver};
use crate::error::SessionError;
use crate::messaging::{GameUpdate, SpectatorLeft, UpdateKind};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Runs a spectator session.
///
/// The first inbound message must be `spectator_join_update`. After a
/// successful join the controller always receives the matching leave before
/// this returns.
pub async fn run_spectator_session(
    controller: Arc<dyn GameController>,
    mut io: SessionIo,
    timeouts: &SessionTimeouts,
) -> Result<SessionEnd, SessionError> {
    let join = match await_join(
        &mut io.inbound,
        UpdateKind::SpectatorJoin,
        timeouts.join,
        |update| match update {
            GameUpdate::SpectatorJoin(join) => Some(join),
            _ => None,
        },
    )
    .await
    {
        Ok(join) => join,
        Err(e @ SessionError::Connection(_)) => {
            debug!("Connection ended before spectator join update: {}", e);
            return Err(e);
        }
        Err(e) => {
            warn!("Failed to receive spectator join update: {}", e);
            return Err(e);
        }
    };

    let game_id = join.game_id;
    let (spectator_id, updates) = match controller.spectator_join(join).await {
        Ok(joined) => joined,
        Err(e) => {
            warn!("Could not spectate game {}: {}", game_id, e);
            return Err(e.into());
        }
    };
    info!(
        "👀 Spectator {} is now spectating game {}",
        spectator_id, game_id
    );

    let membership = LeaveGuard::new(
        controller.clone(),
        LeaveNotice::Spectator(SpectatorLeft {
            game_id,
            spectator_id,
        }),
    );
    let outcome = watch(updates, &mut io, timeouts.idle).await;
    membership.release().await;

    match &outcome {
        Ok(end) => info!(
            "Spectator {} stopped watching game {}: {:?}",
            spectator_id, game_id, end
        ),
        Err(e @ SessionError::Connection(_)) => error!(
            "Spectator {} of game {} lost: {}",
            spectator_id, game_id, e
        ),
        Err(e) => warn!(
            "Spectator {} removed from game {}: {}",
            spectator_id, game_id, e
        ),
    }
    outcome
}

async fn watch(
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
                Some(other) => debug!("Ignoring {} from spectator", other.kind()),
            },
            _ = idle(idle_limit) => {
                return Err(SessionError::Timeout(idle_limit.unwrap_or_default()));
            }
        }
    }
}
