//! HTTP and `WebSocket` gateway for the Paddock race control plane.
//!
//! This crate provides an Axum server that exposes:
//!
//! - **Admin endpoint** (`POST /admin`) that validates query parameters
//!   and applies them to the shared session as one atomic update
//! - **Status endpoints** (`GET /status`, `GET /api/connections`)
//! - **`WebSocket` gateway** (`GET /ws`) with per-session echo relay and
//!   registry membership for driver broadcasts
//!
//! # Architecture
//!
//! Handlers share one [`AppState`]: the session record lives behind a
//! lock and is only ever written by a synchronous update routine, the
//! [`ConnectionRegistry`] is a sharded map whose operations never suspend.
//! No lock spans both. Each `WebSocket` session funnels every outbound
//! message through its own queue so replies and broadcasts never share
//! the socket concurrently.
//!
//! [`ConnectionRegistry`]: registry::ConnectionRegistry

pub mod admin;
pub mod error;
pub mod handlers;
pub mod registry;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod ws;

// Re-export primary types for convenience.
pub use registry::{BroadcastReport, ConnectionId, ConnectionRegistry};
pub use router::build_router;
pub use server::{ServerConfig, ServerError, start_server};
pub use startup::{RunningGateway, spawn_gateway};
pub use state::AppState;
