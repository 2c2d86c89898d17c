//! Read-only status endpoints.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET` | `/status` | Current session snapshot |
//! | `GET` | `/api/connections` | Live `WebSocket` sessions |

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use paddock_core::session::SessionState;

use crate::state::AppState;

/// Return the session snapshot without changing anything.
///
/// Same body as a successful `POST /admin`.
pub async fn status(State(state): State<Arc<AppState>>) -> Json<SessionState> {
    Json(state.session.snapshot().await)
}

/// List the sessions currently eligible for broadcast.
pub async fn list_connections(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let connections = state.registry.list();
    Json(serde_json::json!({
        "count": connections.len(),
        "connections": connections,
    }))
}
