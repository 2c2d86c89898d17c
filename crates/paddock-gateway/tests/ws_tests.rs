//! Integration tests for the `WebSocket` session gateway.
//!
//! Each test binds the gateway on `127.0.0.1:0` and talks to it with a
//! real `tokio-tungstenite` client, so handshake, registration, relay and
//! teardown all run exactly as in production.

#![allow(clippy::unwrap_used, clippy::panic, clippy::indexing_slicing)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt as _, StreamExt as _};
use paddock_core::session::{SessionState, TrackMode};
use paddock_gateway::server::ServerConfig;
use paddock_gateway::spawn_gateway;
use paddock_gateway::state::AppState;
use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn start() -> (Arc<AppState>, SocketAddr) {
    let state = Arc::new(AppState::new(SessionState {
        rate: Some(1.0),
        running: Some(false),
        reset: None,
        participants: Vec::new(),
        time_left: 60.0,
        track_mode: TrackMode::Random,
    }));
    let config = ServerConfig {
        host: String::from("127.0.0.1"),
        port: 0,
    };
    let gateway = spawn_gateway(&config, Arc::clone(&state)).await.unwrap();
    (state, gateway.addr)
}

async fn connect(addr: SocketAddr) -> Client {
    let (client, _) = tokio_tungstenite::connect_async(format!("ws://{addr}/ws"))
        .await
        .unwrap();
    client
}

async fn next_text(client: &mut Client) -> String {
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), client.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        match frame {
            Message::Text(text) => return text.as_str().to_owned(),
            Message::Ping(_) | Message::Pong(_) => {}
            other => panic!("unexpected frame: {other:?}"),
        }
    }
}

async fn wait_for_live(state: &AppState, expected: usize) {
    for _ in 0..500 {
        if state.registry.len() == expected {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!(
        "registry has {} sessions, expected {expected}",
        state.registry.len()
    );
}

#[tokio::test]
async fn test_text_message_is_echoed() {
    let (state, addr) = start().await;
    let mut client = connect(addr).await;

    client.send(Message::text("hello")).await.unwrap();
    assert_eq!(next_text(&mut client).await, "Received: hello");

    wait_for_live(&state, 1).await;
}

#[tokio::test]
async fn test_each_message_gets_exactly_one_reply_in_order() {
    let (_state, addr) = start().await;
    let mut client = connect(addr).await;

    for i in 0..10 {
        client.send(Message::text(format!("m{i}"))).await.unwrap();
    }
    for i in 0..10 {
        assert_eq!(next_text(&mut client).await, format!("Received: m{i}"));
    }
}

#[tokio::test]
async fn test_binary_frame_does_not_end_session() {
    let (state, addr) = start().await;
    let mut client = connect(addr).await;

    client
        .send(Message::binary(vec![0_u8, 1, 2]))
        .await
        .unwrap();
    client.send(Message::text("still here")).await.unwrap();

    assert_eq!(next_text(&mut client).await, "Received: still here");
    wait_for_live(&state, 1).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sessions_only_see_their_own_replies() {
    let (state, addr) = start().await;
    let sessions = 8;

    let mut tasks = Vec::new();
    for n in 0..sessions {
        tasks.push(tokio::spawn(async move {
            let mut client = connect(addr).await;
            for i in 0..5 {
                client
                    .send(Message::text(format!("client-{n}-msg-{i}")))
                    .await
                    .unwrap();
            }
            for i in 0..5 {
                assert_eq!(
                    next_text(&mut client).await,
                    format!("Received: client-{n}-msg-{i}")
                );
            }
            client
        }));
    }

    let mut clients = Vec::new();
    for task in tasks {
        clients.push(task.await.unwrap());
    }
    wait_for_live(&state, sessions).await;
    drop(clients);
}

#[tokio::test]
async fn test_closed_session_leaves_broadcast_set() {
    let (state, addr) = start().await;
    let mut first = connect(addr).await;
    let mut second = connect(addr).await;
    let mut third = connect(addr).await;
    wait_for_live(&state, 3).await;

    second.close(None).await.unwrap();
    wait_for_live(&state, 2).await;

    let report = state.registry.broadcast("tick 1");
    assert_eq!(report.targets, 2);
    assert_eq!(report.delivered, 2);
    assert_eq!(report.closed, 0);

    assert_eq!(next_text(&mut first).await, "tick 1");
    assert_eq!(next_text(&mut third).await, "tick 1");
}

#[tokio::test]
async fn test_dropped_connection_is_unregistered() {
    let (state, addr) = start().await;
    let client = connect(addr).await;
    wait_for_live(&state, 1).await;

    drop(client);
    wait_for_live(&state, 0).await;

    let report = state.registry.broadcast("tick");
    assert_eq!(report.targets, 0);
}

#[tokio::test]
async fn test_broadcast_and_replies_share_one_connection_cleanly() {
    let (state, addr) = start().await;
    let mut client = connect(addr).await;
    wait_for_live(&state, 1).await;

    let broadcaster = {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            for i in 0..20 {
                state.registry.broadcast(&format!("frame {i}"));
                tokio::task::yield_now().await;
            }
        })
    };
    for i in 0..20 {
        client.send(Message::text(format!("m{i}"))).await.unwrap();
    }
    broadcaster.await.unwrap();

    let mut replies = 0;
    let mut frames = 0;
    while replies < 20 {
        let text = next_text(&mut client).await;
        if text.starts_with("Received: m") {
            replies += 1;
        } else {
            assert!(text.starts_with("frame "), "corrupted message: {text}");
            frames += 1;
        }
    }
    assert!(frames <= 20);
}

/// Complete the `WebSocket` handshake by hand so the test can then put
/// arbitrary bytes on the wire.
async fn raw_handshake(addr: SocketAddr) -> TcpStream {
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = format!(
        "GET /ws HTTP/1.1\r\n\
         Host: {addr}\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
         Sec-WebSocket-Version: 13\r\n\r\n"
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = Vec::new();
    let mut buf = [0_u8; 512];
    while !response.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = tokio::time::timeout(Duration::from_secs(5), stream.read(&mut buf))
            .await
            .unwrap()
            .unwrap();
        assert!(n > 0, "connection closed during handshake");
        response.extend_from_slice(&buf[..n]);
    }
    let head = String::from_utf8_lossy(&response);
    assert!(head.starts_with("HTTP/1.1 101"), "unexpected response: {head}");
    stream
}

#[tokio::test]
async fn test_protocol_error_unregisters_session() {
    let (state, addr) = start().await;
    let mut stream = raw_handshake(addr).await;
    wait_for_live(&state, 1).await;

    // Client frames must be masked; this one is not.
    stream.write_all(&[0x81, 0x02, b'h', b'i']).await.unwrap();
    wait_for_live(&state, 0).await;

    let report = state.registry.broadcast("tick");
    assert_eq!(report.targets, 0);
    drop(stream);
}
