//! Shared application state for the gateway server.
//!
//! [`AppState`] bundles the two independently consistent structures the
//! handlers coordinate on: the [`SharedSession`] written by the admin
//! endpoint and the [`ConnectionRegistry`] maintained by the session
//! gateway. The driver loop holds clones of the same `Arc`s.

use std::sync::Arc;

use paddock_core::session::{SessionState, SharedSession};

use crate::registry::ConnectionRegistry;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor. Neither
/// field is copied by the handlers; every request works on the single
/// process-wide instance.
#[derive(Debug, Clone)]
pub struct AppState {
    /// The session record.
    pub session: Arc<SharedSession>,
    /// Live `WebSocket` sessions.
    pub registry: Arc<ConnectionRegistry>,
}

impl AppState {
    /// Create application state around a freshly seeded session and an
    /// empty registry.
    pub fn new(initial: SessionState) -> Self {
        Self::with_parts(
            Arc::new(SharedSession::new(initial)),
            Arc::new(ConnectionRegistry::new()),
        )
    }

    /// Create application state from existing shared parts.
    pub const fn with_parts(session: Arc<SharedSession>, registry: Arc<ConnectionRegistry>) -> Self {
        Self { session, registry }
    }
}
