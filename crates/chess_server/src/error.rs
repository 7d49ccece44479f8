//! Error types for the chess session server.
//!
//! [`ServerError`] covers infrastructure failures such as a failed bind or
//! handshake. [`SessionError`] is the reason a single session terminated.

use crate::controller::ControllerError;
use crate::messaging::UpdateKind;
use thiserror::Error;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Why a session ended abnormally.
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Protocol violation: expected {expected}, received {received}")]
    UnexpectedMessage {
        expected: UpdateKind,
        received: UpdateKind,
    },
    #[error("Connection fault: {0}")]
    Connection(String),
    #[error("Controller rejected request: {0}")]
    Rejected(#[from] ControllerError),
    #[error("Timed out after {0:?} without activity")]
    Timeout(std::time::Duration),
}

impl SessionError {
    /// Whether the client broke the wire protocol.
    pub fn is_protocol_violation(&self) -> bool {
        matches!(self, SessionError::UnexpectedMessage { .. })
    }
}
