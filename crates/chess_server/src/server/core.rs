//! Core server implementation.
//!
//! `GameServer` owns the listening socket and turns every accepted
//! connection into a session task. It holds no game state: that lives behind
//! the [`GameController`] it was built with.

use crate::{
    config::ServerConfig,
    connection::{handle_connection, SessionBootstrap},
    controller::GameController,
    error::ServerError,
};
use socket2::{Domain, Protocol, Socket, Type};
use std::net::{SocketAddr, TcpListener as StdTcpListener};
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Semaphore};
use tracing::{error, info, warn};

/// Pending connections the kernel may queue before `accept`.
const LISTEN_BACKLOG: i32 = 1024;

/// The chess session server.
///
/// # Lifecycle
///
/// 1. [`GameServer::bind`] creates the listening socket
/// 2. [`GameServer::serve`] accepts connections until shutdown
/// 3. [`GameServer::shutdown`] stops the accept loop; sessions already running
///    finish on their own
///
/// [`GameServer::start`] does the first two in one call.
pub struct GameServer {
    /// Server configuration settings
    config: ServerConfig,

    /// Owner of all game state, shared by every session
    controller: Arc<dyn GameController>,

    /// Upgrade settings and session limits applied to each connection
    bootstrap: Arc<SessionBootstrap>,

    /// One permit per allowed concurrent connection
    connection_slots: Arc<Semaphore>,

    /// Flips to `true` when shutdown is requested
    shutdown_sender: watch::Sender<bool>,
}

impl GameServer {
    /// Creates a new server instance.
    ///
    /// Nothing is bound until [`GameServer::bind`] or [`GameServer::start`]
    /// is called.
    ///
    /// # Arguments
    ///
    /// * `config` - Server configuration settings
    /// * `controller` - Owner of game state that every session talks to
    ///
    /// # Returns
    ///
    /// A new `GameServer` instance ready to be started.
    ///
    /// # Panics
    ///
    /// Panics if `config.max_connections` exceeds `Semaphore::MAX_PERMITS`.
    pub fn new(config: ServerConfig, controller: Arc<dyn GameController>) -> Self {
        let bootstrap = Arc::new(SessionBootstrap::new(
            config.upgrade.clone(),
            config.session.clone(),
        ));
        let connection_slots = Arc::new(Semaphore::new(config.max_connections));
        let (shutdown_sender, _) = watch::channel(false);

        Self {
            config,
            controller,
            bootstrap,
            connection_slots,
            shutdown_sender,
        }
    }

    /// Binds the configured address. Must be called inside a tokio runtime.
    ///
    /// # Returns
    ///
    /// The listening socket, or `ServerError::Network` if the address could
    /// not be bound.
    pub fn bind(&self) -> Result<TcpListener, ServerError> {
        let address = self.config.bind_address;
        let socket = Socket::new(Domain::for_address(address), Type::STREAM, Some(Protocol::TCP))
            .map_err(|e| ServerError::Network(format!("Socket creation failed: {e}")))?;
        socket.set_reuse_address(true).ok();

        socket
            .bind(&address.into())
            .map_err(|e| ServerError::Network(format!("Bind failed: {e}")))?;
        socket
            .listen(LISTEN_BACKLOG)
            .map_err(|e| ServerError::Network(format!("Listen failed: {e}")))?;
        socket
            .set_nonblocking(true)
            .map_err(|e| ServerError::Network(format!("Setting non-blocking failed: {e}")))?;

        let std_listener: StdTcpListener = socket.into();
        TcpListener::from_std(std_listener)
            .map_err(|e| ServerError::Network(format!("Tokio listener creation failed: {e}")))
    }

    /// Binds and serves until shutdown.
    pub async fn start(&self) -> Result<(), ServerError> {
        let listener = self.bind()?;
        self.serve(listener).await
    }

    /// Accepts connections on `listener` until shutdown is requested.
    pub async fn serve(&self, listener: TcpListener) -> Result<(), ServerError> {
        let local = listener
            .local_addr()
            .map_err(|e| ServerError::Network(format!("Listener has no address: {e}")))?;
        info!("🚀 Chess server listening on {}", local);
        info!(
            "♟️ Routes: play at {}, spectate at {}",
            self.config.routes.play_path, self.config.routes.spectate_path
        );

        let mut shutdown_receiver = self.shutdown_sender.subscribe();
        if *shutdown_receiver.borrow() {
            return Ok(());
        }

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, addr)) => self.dispatch(stream, addr),
                    Err(e) => error!("Failed to accept connection: {}", e),
                },
                _ = shutdown_receiver.changed() => {
                    info!("Shutdown signal received");
                    break;
                }
            }
        }

        info!("Server stopped");
        Ok(())
    }

    fn dispatch(&self, stream: TcpStream, addr: SocketAddr) {
        let permit = match self.connection_slots.clone().try_acquire_owned() {
            Ok(permit) => permit,
            Err(_) => {
                warn!(
                    "Connection limit of {} reached, refusing {}",
                    self.config.max_connections, addr
                );
                return;
            }
        };

        let routes = self.config.routes.clone();
        let bootstrap = self.bootstrap.clone();
        let controller = self.controller.clone();
        tokio::spawn(async move {
            let _permit = permit;
            if let Err(e) = handle_connection(stream, addr, &routes, &bootstrap, controller).await {
                warn!("Connection error: {}", e);
            }
        });
    }

    /// Stops the accept loop.
    pub async fn shutdown(&self) -> Result<(), ServerError> {
        info!("🛑 Shutting down server...");
        self.shutdown_sender.send_replace(true);
        Ok(())
    }

    /// Gets the controller sessions are bound to.
    pub fn get_controller(&self) -> Arc<dyn GameController> {
        self.controller.clone()
    }

    /// Gets the configuration the server was built with.
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Number of connections currently holding a slot.
    pub fn active_connections(&self) -> usize {
        self.config.max_connections - self.connection_slots.available_permits()
    }
}
