//! Wires one upgraded connection to one session state machine.

use super::pump::{run_reader, run_writer};
use crate::config::{SessionTimeouts, UpgradeConfig};
use crate::controller::GameController;
use crate::error::SessionError;
use crate::session::{SessionEnd, SessionIo, SessionRole};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::protocol::{frame::coding::CloseCode, CloseFrame, WebSocketConfig};
use tokio_tungstenite::WebSocketStream;
use tracing::{debug, warn};

/// How long the writer gets to flush and close once the session is over.
const CLOSE_GRACE: Duration = Duration::from_secs(5);

/// Close reasons are limited to 123 bytes by the WebSocket protocol.
const MAX_CLOSE_REASON: usize = 123;

/// Aborts the wrapped task when dropped, so no pump task outlives its session.
struct TaskGuard(JoinHandle<()>);

impl Drop for TaskGuard {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Builds and runs sessions over upgraded connections.
///
/// Holds the upgrade settings and session limits explicitly, so every server
/// (and every test) can bring its own.
#[derive(Debug, Clone, Default)]
pub struct SessionBootstrap {
    upgrade: UpgradeConfig,
    timeouts: SessionTimeouts,
}

impl SessionBootstrap {
    /// Creates a bootstrap for sessions with the given limits.
    ///
    /// # Arguments
    ///
    /// * `upgrade` - Frame and message limits applied during the upgrade
    /// * `timeouts` - Join and idle limits handed to every session
    pub fn new(upgrade: UpgradeConfig, timeouts: SessionTimeouts) -> Self {
        Self { upgrade, timeouts }
    }

    /// Settings for the protocol upgrade itself.
    pub fn websocket_config(&self) -> WebSocketConfig {
        self.upgrade.to_websocket_config()
    }

    /// Runs one session over `ws` until it terminates.
    ///
    /// Starts the reader and writer, runs the state machine for `role` in the
    /// current task, then tells the writer to close the connection. The pump
    /// tasks are aborted on every exit path, including cancellation of this
    /// future.
    pub async fn run<S>(
        &self,
        ws: WebSocketStream<S>,
        role: SessionRole,
        controller: Arc<dyn GameController>,
        peer: &str,
    ) -> Result<SessionEnd, SessionError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (sink, stream) = ws.split();
        let (inbound_tx, inbound_rx) = mpsc::channel(1);
        let (outbound_tx, outbound_rx) = mpsc::channel(1);
        let (stop_tx, stop_rx) = oneshot::channel();

        let _reader = TaskGuard(tokio::spawn(run_reader(stream, inbound_tx, peer.to_string())));
        let mut writer = TaskGuard(tokio::spawn(run_writer(
            sink,
            outbound_rx,
            stop_rx,
            peer.to_string(),
        )));

        let io = SessionIo {
            inbound: inbound_rx,
            outbound: outbound_tx,
        };
        let outcome = role.run(controller, io, &self.timeouts).await;

        let _ = stop_tx.send(close_frame_for(&outcome));
        match tokio::time::timeout(CLOSE_GRACE, &mut writer.0).await {
            Ok(Ok(())) => debug!("Writer for {} finished", peer),
            Ok(Err(e)) => warn!("Writer for {} ended abnormally: {}", peer, e),
            Err(_) => warn!("Writer for {} did not close within {:?}", peer, CLOSE_GRACE),
        }
        outcome
    }
}

/// Chooses the close frame that tells the client why its session ended.
fn close_frame_for(outcome: &Result<SessionEnd, SessionError>) -> Option<CloseFrame> {
    let (code, reason) = match outcome {
        Ok(SessionEnd::Completed) => (CloseCode::Normal, "game over".to_string()),
        Ok(SessionEnd::ClientDisconnected) => (CloseCode::Normal, String::new()),
        Err(e @ SessionError::UnexpectedMessage { .. }) => (CloseCode::Protocol, e.to_string()),
        Err(SessionError::Rejected(e)) => (CloseCode::Policy, e.to_string()),
        Err(e @ SessionError::Timeout(_)) => (CloseCode::Policy, e.to_string()),
        // The transport is already gone
        Err(SessionError::Connection(_)) => return None,
    };
    Some(CloseFrame {
        code,
        reason: truncate_reason(reason).into(),
    })
}

fn truncate_reason(mut reason: String) -> String {
    if reason.len() > MAX_CLOSE_REASON {
        let mut end = MAX_CLOSE_REASON;
        while !reason.is_char_boundary(end) {
            end -= 1;
        }
        reason.truncate(end);
    }
    reason
}
