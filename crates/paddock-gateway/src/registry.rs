//! Registry of live `WebSocket` sessions.
//!
//! Each session registers one outbound queue when its handshake completes
//! and holds a [`Registration`] guard for the rest of its life. Dropping
//! the guard removes the entry, so removal happens exactly once whether the
//! session ends cleanly, on a transport error, by panic or by task
//! cancellation.
//!
//! The registry never owns a socket. An entry is the sending half of the
//! session's outbound queue; the session's writer task owns the socket and
//! is the only thing that writes to it, which keeps replies and broadcasts
//! from interleaving on the wire.
//!
//! [`ConnectionRegistry::broadcast`] copies the membership first and then
//! offers the message to each queue with a non-blocking `try_send`. A full
//! queue means a slow client: it misses this message and nobody waits.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;
use uuid::Uuid;

/// Capacity of each session's outbound queue.
///
/// Broadcasts to a session whose queue is full are dropped for that
/// session only.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 64;

/// Unique identifier of a live session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    /// Generate a fresh, time-ordered identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// The underlying UUID.
    pub const fn into_inner(self) -> Uuid {
        self.0
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Registry entry: a handle to a session's outbound queue.
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    outbound: mpsc::Sender<String>,
    connected_at: DateTime<Utc>,
}

impl ConnectionHandle {
    /// When the session completed its handshake.
    pub const fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }
}

/// Public view of one registered session.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionInfo {
    /// Session identifier.
    pub id: ConnectionId,
    /// Handshake completion time.
    pub connected_at: DateTime<Utc>,
}

/// Outcome of one broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BroadcastReport {
    /// Sessions in the membership snapshot.
    pub targets: usize,
    /// Sessions whose queue accepted the message.
    pub delivered: usize,
    /// Sessions skipped because their queue was full.
    pub lagging: usize,
    /// Sessions that closed between the snapshot and the send.
    pub closed: usize,
}

/// Concurrent set of live sessions, keyed by [`ConnectionId`].
///
/// Every operation is synchronous and completes without suspending, so an
/// add or remove is never observed half done.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    connections: DashMap<ConnectionId, ConnectionHandle>,
}

impl ConnectionRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a session's outbound queue and return the guard that removes it.
    pub fn register(self: &Arc<Self>, outbound: mpsc::Sender<String>) -> Registration {
        let id = ConnectionId::new();
        self.connections.insert(
            id,
            ConnectionHandle {
                outbound,
                connected_at: Utc::now(),
            },
        );
        debug!(connection = %id, live = self.connections.len(), "Session registered");
        Registration {
            id,
            registry: Arc::clone(self),
        }
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether no session is live.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Whether `id` is currently registered.
    pub fn contains(&self, id: ConnectionId) -> bool {
        self.connections.contains_key(&id)
    }

    /// Snapshot of the live sessions, ordered by id (time-ordered UUIDs).
    pub fn list(&self) -> Vec<ConnectionInfo> {
        let mut infos: Vec<ConnectionInfo> = self
            .connections
            .iter()
            .map(|entry| ConnectionInfo {
                id: *entry.key(),
                connected_at: entry.value().connected_at(),
            })
            .collect();
        infos.sort_by_key(|info| info.id);
        infos
    }

    /// Offer `text` to every session in the current membership snapshot.
    ///
    /// Never waits and never fails: full queues are counted as lagging,
    /// sessions that went away mid-broadcast are counted as closed.
    pub fn broadcast(&self, text: &str) -> BroadcastReport {
        let targets: Vec<(ConnectionId, mpsc::Sender<String>)> = self
            .connections
            .iter()
            .map(|entry| (*entry.key(), entry.value().outbound.clone()))
            .collect();

        let mut report = BroadcastReport {
            targets: targets.len(),
            ..BroadcastReport::default()
        };

        for (id, outbound) in targets {
            match outbound.try_send(text.to_owned()) {
                Ok(()) => report.delivered = report.delivered.saturating_add(1),
                Err(TrySendError::Full(_)) => {
                    debug!(connection = %id, "Outbound queue full, skipping broadcast");
                    report.lagging = report.lagging.saturating_add(1);
                }
                Err(TrySendError::Closed(_)) => {
                    report.closed = report.closed.saturating_add(1);
                }
            }
        }

        report
    }

    fn remove(&self, id: ConnectionId) -> bool {
        self.connections.remove(&id).is_some()
    }
}

/// Scoped membership of one session.
///
/// The entry is removed when the guard is dropped.
#[derive(Debug)]
pub struct Registration {
    id: ConnectionId,
    registry: Arc<ConnectionRegistry>,
}

impl Registration {
    /// The registered session's identifier.
    pub const fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        if self.registry.remove(self.id) {
            debug!(
                connection = %self.id,
                live = self.registry.len(),
                "Session unregistered"
            );
        }
    }
}
