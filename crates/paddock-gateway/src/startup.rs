//! Gateway startup helper for embedding in the engine binary.
//!
//! Provides [`spawn_gateway`] which binds the listen address up front and
//! then serves on a background Tokio task, so the engine can run the
//! driver loop alongside it.
//!
//! # Usage
//!
//! ```rust,ignore
//! use paddock_gateway::startup::spawn_gateway;
//! use paddock_gateway::{AppState, ServerConfig};
//! use std::sync::Arc;
//!
//! let state = Arc::new(AppState::new(config.initial_state()));
//! let gateway = spawn_gateway(&ServerConfig::default(), Arc::clone(&state)).await?;
//! // gateway.addr is the bound address; gateway.handle ends with the server.
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::server::{ServerConfig, ServerError};
use crate::state::AppState;

/// Errors that can occur when spawning the gateway server.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The server failed to bind or start.
    #[error("server start error: {0}")]
    Server(#[from] ServerError),
}

/// A gateway running on a background task.
#[derive(Debug)]
pub struct RunningGateway {
    /// The address the listener is bound to.
    pub addr: SocketAddr,
    /// The serving task. Resolves only if the server stops.
    pub handle: JoinHandle<Result<(), ServerError>>,
}

/// Bind the gateway and serve it on a background task.
///
/// The bind happens before this function returns, so an unusable address
/// is reported here rather than from inside the task.
///
/// # Errors
///
/// Returns [`StartupError::Server`] if the address cannot be bound.
pub async fn spawn_gateway(
    config: &ServerConfig,
    state: Arc<AppState>,
) -> Result<RunningGateway, StartupError> {
    let listener = crate::server::bind(config).await?;
    let addr = listener
        .local_addr()
        .map_err(|e| ServerError::Bind(format!("local address unavailable: {e}")))?;

    let handle = tokio::spawn(crate::server::serve(listener, state));

    tracing::info!(%addr, "Gateway server spawned on background task");

    Ok(RunningGateway { addr, handle })
}
