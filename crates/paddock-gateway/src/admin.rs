//! Admin control endpoint.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/admin` | Update rate, running, reset or participants |
//!
//! All parameters travel in the query string and are optional:
//! `rate` (positive float), `running` and `reset` (`0`/`1`), and
//! `participants` (comma-separated addresses, alias `drivers`). A repeated
//! key keeps its first value, and `participants` wins over `drivers`.
//!
//! A successful call answers with the whole session snapshot so callers
//! can reconcile by reading it rather than by diffing. A failed call
//! answers `400` with `Invalid <field> provided` for the first parameter
//! that did not parse. Parameters that parsed before it are still applied
//! (together, as one update); later ones are ignored.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use paddock_core::session::{SessionState, UpdateParams};
use tracing::{info, warn};

use crate::error::ApiError;
use crate::state::AppState;

/// Validate the query parameters and apply them to the session.
///
/// # Route
///
/// `POST /admin`
pub async fn update_session(
    State(state): State<Arc<AppState>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<SessionState>, ApiError> {
    match UpdateParams::from_pairs(pairs).parse() {
        Ok(update) => {
            let snapshot = state.session.apply(&update).await;
            info!(
                rate = ?snapshot.rate,
                running = ?snapshot.running,
                reset = ?snapshot.reset,
                participants = snapshot.participants.len(),
                "Admin update applied"
            );
            Ok(Json(snapshot))
        }
        Err(rejected) => {
            if !rejected.accepted.is_empty() {
                state.session.apply(&rejected.accepted).await;
            }
            warn!(field = %rejected.error.field(), "Admin update rejected");
            Err(ApiError::Validation(rejected.error))
        }
    }
}
