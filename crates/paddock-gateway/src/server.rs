//! Gateway HTTP server lifecycle management.
//!
//! [`bind`] resolves and binds the listen address; [`serve`] runs the
//! Axum server on a bound listener until the process ends.
//! [`start_server`] does both.

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use crate::router::build_router;
use crate::state::AppState;

/// Configuration for the gateway server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// The host address to bind to (e.g. `0.0.0.0`).
    pub host: String,
    /// The TCP port to listen on.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: String::from("0.0.0.0"),
            port: 8080,
        }
    }
}

impl From<&paddock_core::config::ListenConfig> for ServerConfig {
    fn from(listen: &paddock_core::config::ListenConfig) -> Self {
        Self {
            host: listen.host.clone(),
            port: listen.port,
        }
    }
}

/// Bind a TCP listener on the configured address.
///
/// `host` may be an IP literal (v4 or bare v6) or a hostname such as
/// `localhost`; it is resolved and the first usable address is bound.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] if the host does not resolve or the bind
/// fails.
pub async fn bind(config: &ServerConfig) -> Result<TcpListener, ServerError> {
    TcpListener::bind((config.host.as_str(), config.port))
        .await
        .map_err(|e| {
            ServerError::Bind(format!(
                "bind failed on {}:{}: {e}",
                config.host, config.port
            ))
        })
}

/// Serve the gateway on an already bound listener.
///
/// # Errors
///
/// Returns [`ServerError::Serve`] if the server hits a fatal I/O error.
pub async fn serve(listener: TcpListener, state: Arc<AppState>) -> Result<(), ServerError> {
    let router = build_router(state);

    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "Gateway server listening");
    }

    axum::serve(listener, router)
        .await
        .map_err(|e| ServerError::Serve(format!("serve error: {e}")))
}

/// Bind and serve the gateway until the process is terminated.
///
/// # Errors
///
/// Returns an error if the TCP listener cannot bind or the server
/// encounters a fatal I/O error.
pub async fn start_server(config: &ServerConfig, state: Arc<AppState>) -> Result<(), ServerError> {
    let listener = bind(config).await?;
    serve(listener, state).await
}

/// Errors that can occur when starting or running the gateway server.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// Failed to bind to the network address.
    #[error("bind error: {0}")]
    Bind(String),

    /// The server encountered a fatal error while serving.
    #[error("serve error: {0}")]
    Serve(String),
}
