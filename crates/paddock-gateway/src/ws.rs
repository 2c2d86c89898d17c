//! `WebSocket` session gateway.
//!
//! Clients connect to `GET /ws`. Once the handshake completes the session
//! is registered for broadcasts and every inbound text message `M` is
//! answered on the same connection with `Received: M`.
//!
//! Each session runs as two halves:
//!
//! - the **reader** (the upgrade task) relays inbound frames and queues
//!   replies;
//! - the **writer** (a spawned task) owns the socket's sink and drains the
//!   session's outbound queue.
//!
//! Replies and driver broadcasts both go through the outbound queue, so
//! the writer is the only code that ever writes to the socket.
//!
//! Non-text frames are logged and skipped. A frame error is logged and the
//! loop keeps reading; whether the stream can go on after it is up to the
//! transport, which reports an unrecoverable error by ending the stream.
//! The session ends on a close frame or end of stream.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt as _, StreamExt as _};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::registry::{ConnectionId, OUTBOUND_QUEUE_CAPACITY};
use crate::state::AppState;

/// Reply sent for an inbound text message.
pub fn echo_reply(message: &str) -> String {
    format!("Received: {message}")
}

/// Upgrade an HTTP request to a `WebSocket` session.
///
/// # Route
///
/// `GET /ws`
pub async fn ws_session(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| run_session(socket, state))
}

/// Drive one session from registration to teardown.
async fn run_session(socket: WebSocket, state: Arc<AppState>) {
    let (sink, mut stream) = socket.split();
    let (outbound_tx, outbound_rx) = mpsc::channel::<String>(OUTBOUND_QUEUE_CAPACITY);

    // Removed from the registry when dropped, whichever way this task ends.
    let registration = state.registry.register(outbound_tx.clone());
    let id = registration.id();
    debug!(connection = %id, "WebSocket session opened");

    let writer = tokio::spawn(write_outbound(sink, outbound_rx, id));

    relay_inbound(&mut stream, &outbound_tx, id).await;

    drop(registration);
    drop(outbound_tx);
    if let Err(e) = writer.await {
        warn!(connection = %id, error = %e, "WebSocket writer task failed");
    }
    debug!(connection = %id, "WebSocket session closed");
}

/// Read frames until the session ends, queueing one reply per text frame.
async fn relay_inbound(
    stream: &mut SplitStream<WebSocket>,
    outbound: &mpsc::Sender<String>,
    id: ConnectionId,
) {
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => {
                if outbound.send(echo_reply(text.as_str())).await.is_err() {
                    debug!(connection = %id, "Writer gone, ending session");
                    return;
                }
            }
            Ok(Message::Close(_)) => {
                debug!(connection = %id, "Close frame received");
                return;
            }
            Ok(Message::Binary(data)) => {
                debug!(connection = %id, bytes = data.len(), "Ignoring binary frame");
            }
            Ok(Message::Ping(_) | Message::Pong(_)) => {}
            Err(e) => {
                warn!(connection = %id, error = %e, "WebSocket frame error");
            }
        }
    }

    debug!(connection = %id, "WebSocket stream ended");
}

/// Write queued messages to the socket until every sender is gone, then
/// close the socket.
async fn write_outbound(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<String>,
    id: ConnectionId,
) {
    while let Some(text) = outbound.recv().await {
        if let Err(e) = sink.send(Message::Text(text.into())).await {
            debug!(connection = %id, error = %e, "WebSocket send failed");
            break;
        }
    }

    if let Err(e) = sink.close().await {
        debug!(connection = %id, error = %e, "WebSocket close failed");
    }
}
