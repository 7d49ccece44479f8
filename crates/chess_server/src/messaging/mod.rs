//! Envelope definitions and the JSON codec used on the wire.

mod types;

pub use types::{
    GameId, GameResult, GameUpdate, MoveUpdate, PlayerId, PlayerJoined, PlayerLeft,
    SpectatorId, SpectatorJoin, SpectatorLeft, UpdateKind,
};

use crate::error::ServerError;

/// Decodes one text frame into an envelope.
pub fn decode(text: &str) -> Result<GameUpdate, ServerError> {
    serde_json::from_str(text).map_err(|e| ServerError::Serialization(format!("Invalid envelope: {e}")))
}

/// Decodes one binary frame into an envelope.
pub fn decode_bytes(bytes: &[u8]) -> Result<GameUpdate, ServerError> {
    serde_json::from_slice(bytes)
        .map_err(|e| ServerError::Serialization(format!("Invalid envelope: {e}")))
}

/// Encodes an envelope for a text frame.
pub fn encode(update: &GameUpdate) -> Result<String, ServerError> {
    serde_json::to_string(update)
        .map_err(|e| ServerError::Serialization(format!("Failed to encode {}: {e}", update.kind())))
}
