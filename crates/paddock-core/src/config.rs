//! Configuration loading and typed config structures for Paddock.
//!
//! The configuration lives in `paddock-config.yaml` (or the file named by
//! `PADDOCK_CONFIG`). Every field has a default, so a missing file or a
//! partial file is fine. Environment variables override the YAML values
//! for the startup contract:
//!
//! | Variable | Overrides |
//! |----------|-----------|
//! | `PADDOCK_HOST` | `server.host` |
//! | `PADDOCK_PORT` | `server.port` |
//! | `PADDOCK_RATE` | `session.rate` |
//! | `PADDOCK_RUNNING` | `session.running` |
//! | `PADDOCK_PARTICIPANTS` | `session.participants` (comma-separated) |
//! | `PADDOCK_TRACK_MODE` | `session.track_mode` |

use std::path::Path;

use serde::Deserialize;

use crate::session::{SessionState, TrackMode, parse_participants};

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// A value was syntactically valid but not acceptable.
    #[error("invalid value for {key}: {message}")]
    Invalid {
        /// Dotted config key or environment variable name.
        key: String,
        /// What was wrong with it.
        message: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key: key.to_owned(),
        message: message.into(),
    }
}

/// Top-level Paddock configuration.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PaddockConfig {
    /// Listen address of the HTTP server.
    #[serde(default)]
    pub server: ListenConfig,

    /// Initial session values.
    #[serde(default)]
    pub session: SessionConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl PaddockConfig {
    /// Load configuration from a YAML file, then apply environment
    /// overrides and validate.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if it is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = serde_yml::from_str(&contents)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a YAML string and validate it.
    ///
    /// Environment overrides are not applied.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] or [`ConfigError::Invalid`].
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if an override cannot be parsed.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if an override cannot be parsed.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("PADDOCK_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("PADDOCK_PORT") {
            self.server.port = port
                .trim()
                .parse()
                .map_err(|e| invalid("PADDOCK_PORT", format!("{e}")))?;
        }
        if let Some(rate) = lookup("PADDOCK_RATE") {
            self.session.rate = rate
                .trim()
                .parse()
                .map_err(|e| invalid("PADDOCK_RATE", format!("{e}")))?;
        }
        if let Some(running) = lookup("PADDOCK_RUNNING") {
            self.session.running = parse_bool(&running)
                .ok_or_else(|| invalid("PADDOCK_RUNNING", "expected true/false or 1/0"))?;
        }
        if let Some(participants) = lookup("PADDOCK_PARTICIPANTS") {
            self.session.participants = if participants.trim().is_empty() {
                Vec::new()
            } else {
                parse_participants(&participants)
                    .ok_or_else(|| invalid("PADDOCK_PARTICIPANTS", "empty entry in list"))?
            };
        }
        if let Some(mode) = lookup("PADDOCK_TRACK_MODE") {
            self.session.track_mode = mode
                .parse()
                .map_err(|e| invalid("PADDOCK_TRACK_MODE", format!("{e}")))?;
        }
        Ok(())
    }

    /// Check value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let session = &self.session;
        if !(session.rate.is_finite() && session.rate > 0.0) {
            return Err(invalid("session.rate", "must be a positive number of seconds"));
        }
        if !(session.game_duration_seconds.is_finite() && session.game_duration_seconds >= 0.0) {
            return Err(invalid(
                "session.game_duration_seconds",
                "must be a non-negative number of seconds",
            ));
        }
        if session.participants.iter().any(|p| p.trim().is_empty()) {
            return Err(invalid("session.participants", "entries must be non-empty"));
        }
        Ok(())
    }

    /// Build the session record the process starts with.
    pub fn initial_state(&self) -> SessionState {
        SessionState {
            rate: Some(self.session.rate),
            running: Some(self.session.running),
            reset: None,
            participants: self.session.participants.clone(),
            time_left: self.session.game_duration_seconds,
            track_mode: self.session.track_mode,
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Some(true),
        "0" | "false" | "no" => Some(false),
        _ => None,
    }
}

/// HTTP listen address.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ListenConfig {
    /// Address to bind (e.g. `0.0.0.0`).
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Initial session values.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SessionConfig {
    /// Tick interval in seconds.
    #[serde(default = "default_rate")]
    pub rate: f64,

    /// Whether the race starts running.
    #[serde(default)]
    pub running: bool,

    /// Participant endpoint addresses.
    #[serde(default)]
    pub participants: Vec<String>,

    /// Track selection mode.
    #[serde(default)]
    pub track_mode: TrackMode,

    /// Length of one race in seconds.
    #[serde(default = "default_game_duration_seconds")]
    pub game_duration_seconds: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            rate: default_rate(),
            running: false,
            participants: Vec::new(),
            track_mode: TrackMode::default(),
            game_duration_seconds: default_game_duration_seconds(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Log level used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_host() -> String {
    String::from("0.0.0.0")
}

const fn default_port() -> u16 {
    8080
}

const fn default_rate() -> f64 {
    1.0
}

const fn default_game_duration_seconds() -> f64 {
    300.0
}

fn default_log_level() -> String {
    String::from("info")
}
