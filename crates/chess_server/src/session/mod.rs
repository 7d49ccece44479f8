//! Session state machines.
//!
//! A session is one connection bound to one role in one game. Both roles run
//! the same three phases: wait for the join message, exchange updates while
//! active, then notify the controller that the participant left. The leave
//! notification is tied to a successful join through [`LeaveGuard`], so it
//! is sent exactly once no matter how the active phase ends.

mod guard;
mod player;
mod spectator;

pub use player::run_player_session;
pub use spectator::run_spectator_session;

pub(crate) use guard::{LeaveGuard, LeaveNotice};

use crate::controller::GameController;
use crate::error::SessionError;
use crate::messaging::{GameUpdate, UpdateKind};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

/// The two channel ends a session owns.
#[derive(Debug)]
pub struct SessionIo {
    /// Envelopes decoded by the reader task
    pub inbound: mpsc::Receiver<GameUpdate>,
    /// Updates for the writer task
    pub outbound: mpsc::Sender<GameUpdate>,
}

/// Limits on how long a session may sit without progress.
///
/// `None` disables a limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTimeouts {
    /// How long a fresh connection may take to send its join message
    pub join: Option<Duration>,
    /// How long an active session may go without any update or client message
    pub idle: Option<Duration>,
}

impl Default for SessionTimeouts {
    fn default() -> Self {
        Self {
            join: Some(Duration::from_secs(30)),
            idle: Some(Duration::from_secs(600)),
        }
    }
}

/// How a session ended when nothing went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The result update was delivered
    Completed,
    /// The client went away
    ClientDisconnected,
}

/// Which state machine serves a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionRole {
    Player,
    Spectator,
}

impl SessionRole {
    /// Runs the state machine for this role to completion.
    pub async fn run(
        self,
        controller: Arc<dyn GameController>,
        io: SessionIo,
        timeouts: &SessionTimeouts,
    ) -> Result<SessionEnd, SessionError> {
        match self {
            SessionRole::Player => run_player_session(controller, io, timeouts).await,
            SessionRole::Spectator => run_spectator_session(controller, io, timeouts).await,
        }
    }
}

impl fmt::Display for SessionRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionRole::Player => f.write_str("player"),
            SessionRole::Spectator => f.write_str("spectator"),
        }
    }
}

/// Waits for the first message and extracts the expected join from it.
async fn await_join<T>(
    inbound: &mut mpsc::Receiver<GameUpdate>,
    expected: UpdateKind,
    limit: Option<Duration>,
    extract: impl FnOnce(GameUpdate) -> Option<T>,
) -> Result<T, SessionError> {
    let first = match limit {
        Some(limit) => tokio::time::timeout(limit, inbound.recv())
            .await
            .map_err(|_| SessionError::Timeout(limit))?,
        None => inbound.recv().await,
    };

    let update = match first {
        None => {
            return Err(SessionError::Connection(
                "client channel closed before join".to_string(),
            ))
        }
        Some(GameUpdate::Eof) => {
            return Err(SessionError::Connection(
                "client disconnected before join".to_string(),
            ))
        }
        Some(update) => update,
    };
    let received = update.kind();
    extract(update).ok_or(SessionError::UnexpectedMessage { expected, received })
}

/// Resolves once the session has been idle for `limit`; never resolves for `None`.
async fn idle(limit: Option<Duration>) {
    match limit {
        Some(limit) => tokio::time::sleep(limit).await,
        None => std::future::pending().await,
    }
}

/// Hands an update to the writer.
async fn forward(outbound: &mpsc::Sender<GameUpdate>, update: GameUpdate) -> Result<(), SessionError> {
    outbound.send(update).await.map_err(|e| {
        SessionError::Connection(format!("writer closed before {} was delivered", e.0.kind()))
    })
}
