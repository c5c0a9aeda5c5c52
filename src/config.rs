//! Configuration with validation and defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Top-level configuration for the engine and its API surface.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WingoConfig {
    pub game: GameConfig,
    pub api: ApiConfig,
    pub monitoring: MonitoringConfig,
}

/// Round engine tuning.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Bets are rejected once remaining time drops below this window.
    pub bet_grace_window_secs: u64,
    /// Default number of history rows returned per track.
    pub history_limit: usize,
    /// Interval of the settlement sweep that retries failed wagers.
    pub settle_poll_interval_secs: u64,
    /// Capacity of the engine event bus.
    pub event_bus_capacity: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            bet_grace_window_secs: 5,
            history_limit: 50,
            settle_poll_interval_secs: 10,
            event_bus_capacity: 1024,
        }
    }
}

/// API server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            allowed_origins: vec!["*".to_string()],
            request_timeout_secs: 30,
        }
    }
}

/// Logging and metrics configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringConfig {
    pub enable_metrics: bool,
    /// Default tracing filter, overridable via `RUST_LOG`.
    pub log_filter: String,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        Self {
            enable_metrics: true,
            log_filter: "wingo=info,tower_http=info".to_string(),
        }
    }
}

impl WingoConfig {
    /// Load configuration from a TOML file. Missing sections fall back to
    /// their defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::LoadFailed(format!("{}: {}", path.display(), e)))?;
        let config: WingoConfig =
            toml::from_str(&raw).map_err(|e| ConfigError::LoadFailed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate logical consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let min_duration = crate::game::types::Track::ALL
            .iter()
            .map(|t| t.duration_secs())
            .min()
            .unwrap_or(30);
        if self.game.bet_grace_window_secs >= min_duration {
            return Err(ConfigError::InvalidValue(format!(
                "bet_grace_window_secs ({}) must be shorter than the shortest track ({}s)",
                self.game.bet_grace_window_secs, min_duration
            )));
        }
        if self.game.settle_poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue(
                "settle_poll_interval_secs must be > 0".to_string(),
            ));
        }
        if self.game.event_bus_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "event_bus_capacity must be > 0".to_string(),
            ));
        }
        if self.game.history_limit == 0 {
            return Err(ConfigError::InvalidValue(
                "history_limit must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.request_timeout_secs)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid configuration value: {0}")]
    InvalidValue(String),

    #[error("failed to load configuration: {0}")]
    LoadFailed(String),
}
