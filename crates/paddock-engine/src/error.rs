//! Error types for the Paddock engine binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during startup and while the race is being driven.

/// Top-level error for the engine binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: paddock_core::config::ConfigError,
    },

    /// The gateway could not be started.
    #[error("gateway startup error: {source}")]
    Startup {
        /// The underlying startup error.
        #[from]
        source: paddock_gateway::startup::StartupError,
    },

    /// The gateway stopped serving.
    #[error("gateway error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: paddock_gateway::ServerError,
    },

    /// The driver loop hit a simulation fault.
    #[error("runner error: {source}")]
    Runner {
        /// The underlying runner error.
        #[from]
        source: paddock_core::runner::RunnerError,
    },

    /// The gateway task panicked or was cancelled.
    #[error("gateway task failed: {message}")]
    GatewayTask {
        /// Description of the join failure.
        message: String,
    },
}
