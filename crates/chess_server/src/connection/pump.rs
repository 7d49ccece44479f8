//! Socket I/O pump.
//!
//! Two tasks per connection keep the session state machine away from the
//! socket: the reader turns incoming frames into envelopes on the inbound
//! channel, and the writer turns envelopes from the outbound channel into
//! frames. Neither touches session state; they only move messages.

use crate::messaging::{self, GameUpdate};
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::{protocol::CloseFrame, Error as WsError, Message};
use tracing::{debug, error, warn};

/// Signal telling the writer to stop, carrying the close frame to send.
pub type StopSignal = oneshot::Receiver<Option<CloseFrame>>;

/// Reads frames until the connection ends, forwarding each decoded envelope.
///
/// Whatever ends the connection (close frame, end of stream, transport error
/// or an undecodable frame), the session sees exactly one [`GameUpdate::Eof`]
/// before the channel goes quiet. If the session is no longer listening the
/// reader exits without further work.
pub async fn run_reader<S>(mut frames: S, inbound: mpsc::Sender<GameUpdate>, peer: String)
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    while let Some(frame) = frames.next().await {
        let decoded = match frame {
            Ok(Message::Text(text)) => messaging::decode(text.as_str()),
            Ok(Message::Binary(bytes)) => messaging::decode_bytes(&bytes),
            Ok(Message::Close(frame)) => {
                debug!("Connection {} requested close: {:?}", peer, frame);
                break;
            }
            // Ping replies are queued by tungstenite itself
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => continue,
            Err(e) => {
                error!("WebSocket error for connection {}: {}", peer, e);
                break;
            }
        };

        let update = match decoded {
            Ok(update) => update,
            Err(e) => {
                warn!("Dropping connection {}: {}", peer, e);
                break;
            }
        };

        debug!("📨 Received {} from {}", update.kind(), peer);
        let is_eof = matches!(update, GameUpdate::Eof);
        if inbound.send(update).await.is_err() {
            return;
        }
        if is_eof {
            return;
        }
    }

    let _ = inbound.send(GameUpdate::Eof).await;
}

/// Writes outbound envelopes until told to stop.
///
/// On stop, updates the session already queued are flushed before the close
/// frame goes out, so a final result is never cut off. Any encode or send
/// failure ends the writer; dropping `outbound` on exit makes the session's
/// next forward fail, which is how the session learns the client is gone.
pub async fn run_writer<K>(
    mut sink: K,
    mut outbound: mpsc::Receiver<GameUpdate>,
    mut stop: StopSignal,
    peer: String,
) where
    K: Sink<Message, Error = WsError> + Unpin,
{
    let close = loop {
        tokio::select! {
            biased;
            update = outbound.recv() => match update {
                Some(update) => {
                    if let Err(e) = write_update(&mut sink, &update, &peer).await {
                        error!("Writer for {} failed: {}", peer, e);
                        return;
                    }
                }
                // Session is gone; wait for the close reason it left behind
                None => break (&mut stop).await.unwrap_or(None),
            },
            close = &mut stop => {
                while let Ok(update) = outbound.try_recv() {
                    if let Err(e) = write_update(&mut sink, &update, &peer).await {
                        error!("Writer for {} failed while draining: {}", peer, e);
                        return;
                    }
                }
                break close.unwrap_or(None);
            }
        }
    };

    if let Some(frame) = close {
        if let Err(e) = sink.send(Message::Close(Some(frame))).await {
            debug!("Close frame to {} not delivered: {}", peer, e);
        }
    }
    if let Err(e) = sink.close().await {
        debug!("Closing sink for {} failed: {}", peer, e);
    }
}

async fn write_update<K>(sink: &mut K, update: &GameUpdate, peer: &str) -> Result<(), String>
where
    K: Sink<Message, Error = WsError> + Unpin,
{
    let text = messaging::encode(update).map_err(|e| e.to_string())?;
    debug!("📤 Sending {} to {}", update.kind(), peer);
    sink.send(Message::text(text))
        .await
        .map_err(|e| e.to_string())
}
