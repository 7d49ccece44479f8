//! End-to-end tests over real sockets
//!
//! These tests start a server on an ephemeral port and drive it with
//! WebSocket clients the way a chess front end would.

use chess_server::controller::GameRegistry;
use chess_server::messaging::{
    decode, encode, GameId, GameResult, GameUpdate, MoveUpdate, PlayerId, PlayerJoined,
    SpectatorJoin,
};
use chess_server::{GameServer, ServerConfig};
use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout, Duration};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

const STEP: Duration = Duration::from_secs(5);

/// Starts a server on an ephemeral port backed by a fresh registry
async fn start_server() -> (Arc<GameServer>, Arc<GameRegistry>, SocketAddr) {
    let config = ServerConfig {
        bind_address: "127.0.0.1:0".parse().unwrap(),
        ..Default::default()
    };
    let registry = Arc::new(GameRegistry::default());
    let server = Arc::new(GameServer::new(config, registry.clone()));
    let listener = server.bind().expect("Failed to bind test server");
    let addr = listener.local_addr().unwrap();

    let running = server.clone();
    tokio::spawn(async move { running.serve(listener).await });
    (server, registry, addr)
}

async fn connect(addr: SocketAddr, path: &str) -> Client {
    let (client, _) = connect_async(format!("ws://{addr}{path}"))
        .await
        .expect("Failed to connect");
    client
}

async fn send(client: &mut Client, update: GameUpdate) {
    let text = encode(&update).unwrap();
    client.send(Message::text(text)).await.unwrap();
}

async fn next_update(client: &mut Client) -> GameUpdate {
    loop {
        let message = timeout(STEP, client.next())
            .await
            .expect("Timed out waiting for an update")
            .expect("Stream ended")
            .expect("Socket error");
        match message {
            Message::Text(text) => return decode(text.as_str()).unwrap(),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("Expected a text frame, got {other:?}"),
        }
    }
}

async fn expect_close(client: &mut Client, code: CloseCode) {
    loop {
        match timeout(STEP, client.next()).await.expect("Timed out waiting for close") {
            Some(Ok(Message::Close(frame))) => {
                let frame = frame.expect("Close frame without a code");
                assert_eq!(frame.code, code);
                return;
            }
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => continue,
            other => panic!("Expected a close frame, got {other:?}"),
        }
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    timeout(STEP, async {
        while !condition() {
            sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("Condition never held");
}

fn player_join(game: u64, player: u64) -> GameUpdate {
    GameUpdate::PlayerJoined(PlayerJoined {
        game_id: GameId(game),
        player_id: PlayerId(player),
    })
}

#[tokio::test(flavor = "multi_thread")]
async fn test_full_game_with_spectator() {
    let (server, registry, addr) = start_server().await;
    let game = GameId(1);

    let mut white = connect(addr, "/play").await;
    send(&mut white, player_join(1, 1)).await;
    wait_until(|| registry.seated(game).len() == 1).await;

    let mut black = connect(addr, "/play").await;
    send(&mut black, player_join(1, 2)).await;
    assert_eq!(next_update(&mut white).await, player_join(1, 2));

    let mut watcher = connect(addr, "/spectate").await;
    send(&mut watcher, GameUpdate::SpectatorJoin(SpectatorJoin { game_id: game })).await;
    wait_until(|| registry.spectator_count(game) == 1).await;

    send(&mut white, GameUpdate::Move(MoveUpdate::new("e2e4"))).await;
    let relayed = GameUpdate::Move(MoveUpdate {
        mv: "e2e4".to_string(),
        player_id: Some(PlayerId(1)),
    });
    assert_eq!(next_update(&mut black).await, relayed);
    assert_eq!(next_update(&mut watcher).await, relayed);

    send(&mut black, GameUpdate::Move(MoveUpdate::new("e7e5"))).await;
    let reply = GameUpdate::Move(MoveUpdate {
        mv: "e7e5".to_string(),
        player_id: Some(PlayerId(2)),
    });
    assert_eq!(next_update(&mut white).await, reply);
    assert_eq!(next_update(&mut watcher).await, reply);
    assert_eq!(
        registry.moves(game),
        Some(vec!["e2e4".to_string(), "e7e5".to_string()])
    );

    registry
        .finish_game(game, Some(PlayerId(1)), "checkmate")
        .unwrap();
    let result = GameUpdate::Result(GameResult {
        game_id: game,
        winner: Some(PlayerId(1)),
        reason: "checkmate".to_string(),
    });
    for client in [&mut white, &mut black, &mut watcher] {
        assert_eq!(next_update(client).await, result);
        expect_close(client, CloseCode::Normal).await;
    }

    server.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unknown_path_is_refused() {
    let (server, _registry, addr) = start_server().await;

    match connect_async(format!("ws://{addr}/lobby")).await {
        Err(WsError::Http(response)) => assert_eq!(response.status(), 404),
        Err(e) => panic!("Expected 404, got {e}"),
        Ok(_) => panic!("Expected 404, the upgrade succeeded"),
    }

    server.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_disconnect_forfeits_the_game() {
    let (server, registry, addr) = start_server().await;
    let game = GameId(2);

    let mut white = connect(addr, "/play").await;
    send(&mut white, player_join(2, 1)).await;
    wait_until(|| registry.seated(game).len() == 1).await;

    let mut black = connect(addr, "/play").await;
    send(&mut black, player_join(2, 2)).await;
    assert_eq!(next_update(&mut white).await, player_join(2, 2));

    black.close(None).await.unwrap();

    assert_eq!(
        next_update(&mut white).await,
        GameUpdate::Result(GameResult {
            game_id: game,
            winner: Some(PlayerId(1)),
            reason: "opponent left".to_string(),
        })
    );
    expect_close(&mut white, CloseCode::Normal).await;
    wait_until(|| registry.game_count() == 0).await;

    server.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_move_before_join_is_a_protocol_error() {
    let (server, _registry, addr) = start_server().await;

    let mut client = connect(addr, "/play").await;
    send(&mut client, GameUpdate::Move(MoveUpdate::new("e2e4"))).await;
    expect_close(&mut client, CloseCode::Protocol).await;

    server.shutdown().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
async fn test_spectating_unknown_game_is_rejected() {
    let (server, _registry, addr) = start_server().await;

    let mut client = connect(addr, "/spectate").await;
    send(
        &mut client,
        GameUpdate::SpectatorJoin(SpectatorJoin { game_id: GameId(404) }),
    )
    .await;
    expect_close(&mut client, CloseCode::Policy).await;

    server.shutdown().await.unwrap();
}
