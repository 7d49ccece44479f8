//! Accepted TCP stream to finished session: upgrade, route, run.

use super::{client::ClientConnection, SessionBootstrap};
use crate::config::RouteConfig;
use crate::controller::GameController;
use crate::error::ServerError;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio_tungstenite::accept_hdr_async_with_config;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tracing::{debug, info};

/// Upgrades `stream` to a WebSocket and runs the session its path selects.
///
/// Requests for paths with no route are refused during the handshake with
/// `404 Not Found`. Session outcomes are logged by the session itself; only
/// failures before a session exists are returned.
pub async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    routes: &RouteConfig,
    bootstrap: &SessionBootstrap,
    controller: Arc<dyn GameController>,
) -> Result<(), ServerError> {
    if let Err(e) = stream.set_nodelay(true) {
        debug!("Could not set TCP_NODELAY for {}: {}", addr, e);
    }

    let mut role = None;
    let route = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let path = request.uri().path();
        match routes.resolve(path) {
            Some(selected) => {
                role = Some(selected);
                Ok(response)
            }
            None => {
                let mut refusal = ErrorResponse::new(Some(format!("No session route at {path}")));
                *refusal.status_mut() = StatusCode::NOT_FOUND;
                Err(refusal)
            }
        }
    };

    let ws = accept_hdr_async_with_config(stream, route, Some(bootstrap.websocket_config()))
        .await
        .map_err(|e| ServerError::Network(format!("WebSocket handshake failed for {addr}: {e}")))?;
    let role = role.ok_or_else(|| {
        ServerError::Internal(format!("Handshake for {addr} completed without a route"))
    })?;

    let client = ClientConnection::new(addr, role);
    info!("🔗 Connection {} established", client.label());
    let outcome = bootstrap
        .run(ws, role, controller, &client.label())
        .await;
    info!(
        "Connection {} closed after {:.2?} ({})",
        client.label(),
        client.elapsed(),
        if outcome.is_ok() { "clean" } else { "terminated" }
    );
    Ok(())
}
