//! Paddock engine binary.
//!
//! This is the main entry point that wires together the shared session,
//! the HTTP/`WebSocket` gateway and the race driver loop. It loads
//! configuration, starts the gateway and drives the race until the
//! process is interrupted or a subsystem fails.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `paddock-config.yaml` (or `PADDOCK_CONFIG`)
//! 2. Initialize structured logging (tracing)
//! 3. Build the shared session from the configured initial values
//! 4. Bind and spawn the gateway
//! 5. Run the driver loop until Ctrl-C, a gateway failure or a
//!    simulation fault

mod broadcast_sink;
mod error;

use std::path::PathBuf;
use std::sync::Arc;

use paddock_core::config::PaddockConfig;
use paddock_core::countdown::CountdownSimulation;
use paddock_core::runner::{self, DriverConfig};
use paddock_gateway::server::ServerConfig;
use paddock_gateway::state::AppState;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::broadcast_sink::RegistrySink;
use crate::error::EngineError;

/// Config file read when `PADDOCK_CONFIG` is not set.
const DEFAULT_CONFIG_PATH: &str = "paddock-config.yaml";

/// Application entry point for the engine.
///
/// # Errors
///
/// Returns an error if configuration is invalid, the gateway cannot bind
/// or stops, or the driver loop faults.
#[tokio::main]
async fn main() -> Result<(), EngineError> {
    // 1. Load configuration. Logging is not up yet, so report later.
    let (config, config_source) = load_config()?;

    // 2. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!(source = %config_source, "paddock-engine starting");

    // 3. Shared state.
    let state = Arc::new(AppState::new(config.initial_state()));

    // 4. Gateway.
    let server_config = ServerConfig::from(&config.server);
    let gateway = paddock_gateway::spawn_gateway(&server_config, Arc::clone(&state)).await?;

    info!(
        track = %config.session.track_mode,
        drivers = ?config.session.participants,
        listen = %gateway.addr,
        server_url = %format!("http://{}:{}", server_config.host, gateway.addr.port()),
        "Race control ready"
    );

    // 5. Drive the race.
    let mut simulation = CountdownSimulation::new();
    let sink = RegistrySink::new(Arc::clone(&state.registry));
    let driver_config = DriverConfig {
        game_duration_seconds: config.session.game_duration_seconds,
    };

    tokio::select! {
        result = runner::run_driver(&state.session, &mut simulation, &sink, driver_config) => {
            if let Err(ref e) = result {
                error!(error = %e, "Driver loop stopped");
            }
            result?;
        }
        joined = gateway.handle => {
            match joined {
                Ok(served) => served?,
                Err(e) => {
                    return Err(EngineError::GatewayTask {
                        message: format!("{e}"),
                    });
                }
            }
        }
        signal = tokio::signal::ctrl_c() => {
            if let Err(e) = signal {
                error!(error = %e, "Failed to listen for Ctrl-C");
            }
            info!("Interrupt received, shutting down");
        }
    }

    info!(
        races = simulation.races(),
        live_sessions = state.registry.len(),
        "paddock-engine shutdown complete"
    );

    Ok(())
}

/// Load configuration from `PADDOCK_CONFIG` or `paddock-config.yaml`.
///
/// A missing file means defaults; environment overrides and validation
/// apply either way. Returns the config and a description of its source.
fn load_config() -> Result<(PaddockConfig, String), EngineError> {
    let config_path = std::env::var("PADDOCK_CONFIG")
        .map_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH), PathBuf::from);

    if config_path.exists() {
        let config = PaddockConfig::from_file(&config_path)?;
        Ok((config, config_path.display().to_string()))
    } else {
        let mut config = PaddockConfig::default();
        config.apply_env_overrides()?;
        config.validate()?;
        Ok((config, String::from("defaults")))
    }
}
