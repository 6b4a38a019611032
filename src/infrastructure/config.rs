//! Configuration management for the dispatcher
//!
//! Loads configuration from config.toml at startup.
//! All values are configurable to avoid hardcoded constants.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Dispatcher configuration
///
/// Loaded from config.toml at startup, or built with [`Default`]. Contains
/// all tunable parameters to avoid hardcoded values throughout the codebase.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DispatcherConfig {
    /// Number of pool worker threads (0 = number of logical CPUs)
    #[serde(default)]
    pub workers: usize,

    /// Soft cap on outstanding items; crossing it logs a warning,
    /// dispatch is never blocked or rejected
    #[serde(default = "default_soft_backlog_limit")]
    pub soft_backlog_limit: usize,

    /// Poll interval for `wait`, in milliseconds
    #[serde(default = "default_wait_poll_ms")]
    pub wait_poll_ms: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            soft_backlog_limit: default_soft_backlog_limit(),
            wait_poll_ms: default_wait_poll_ms(),
        }
    }
}

fn default_soft_backlog_limit() -> usize {
    250
}

fn default_wait_poll_ms() -> u64 {
    50
}

impl DispatcherConfig {
    /// Load configuration from config.toml file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// # Errors
    /// Returns error if file exists but cannot be parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.toml".to_string());

        match std::fs::read_to_string(&config_path) {
            Ok(contents) => {
                let config: DispatcherConfig = toml::from_str(&contents)
                    .map_err(|e| ConfigError::ParseError(e.to_string()))?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                // File not found - use defaults
                Ok(DispatcherConfig::default())
            }
            Err(e) => Err(ConfigError::IoError(e)),
        }
    }

    /// Effective worker count (resolves 0 to the logical CPU count)
    pub fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4)
        }
    }

    /// Poll interval for `wait` as a [`Duration`]
    #[inline]
    pub fn wait_poll_interval(&self) -> Duration {
        Duration::from_millis(self.wait_poll_ms.max(1))
    }
}

/// Configuration loading error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse config: {0}")]
    ParseError(String),

    #[error("failed to read config: {0}")]
    IoError(#[from] std::io::Error),
}
