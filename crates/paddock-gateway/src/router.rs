//! Axum router construction for the gateway.
//!
//! Assembles the admin endpoint, the status endpoints and the `WebSocket`
//! gateway into a single [`Router`] with CORS and request tracing.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;
use crate::{admin, handlers, ws};

/// Build the complete Axum router for the gateway.
///
/// The router includes:
/// - `POST /admin` -- validate and apply a session update
/// - `GET /status` -- current session snapshot
/// - `GET /api/connections` -- live `WebSocket` sessions
/// - `GET /ws` -- `WebSocket` session gateway
///
/// CORS allows any origin so a browser dashboard served elsewhere can
/// poll the snapshot.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        // Control surface
        .route("/admin", post(admin::update_session))
        .route("/status", get(handlers::status))
        .route("/api/connections", get(handlers::list_connections))
        // WebSocket
        .route("/ws", get(ws::ws_session))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
