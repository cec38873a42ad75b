//! Configuration types for Retake

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::{Result, RetakeError};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory for storing/loading fixtures
    #[serde(default = "default_fixtures_dir")]
    pub fixtures_dir: PathBuf,
    /// Quiescence wait tuning
    #[serde(default)]
    pub quiesce: QuiesceConfig,
}

fn default_fixtures_dir() -> PathBuf {
    PathBuf::from("mocks")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fixtures_dir: default_fixtures_dir(),
            quiesce: QuiesceConfig::default(),
        }
    }
}

/// Quiescence wait tuning
///
/// Before a recording session is persisted, the engine polls the in-flight
/// request counter so that slow responses still make it into the fixture.
/// The wait is best-effort: once the poll budget is exhausted the session is
/// persisted with whatever completed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QuiesceConfig {
    /// Delay between polls of the pending-request counter, in milliseconds
    pub poll_interval_ms: u64,
    /// Maximum number of polls before giving up
    pub max_polls: u32,
}

impl Default for QuiesceConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: crate::recording::QUIESCE_POLL_INTERVAL_MS,
            max_polls: crate::recording::QUIESCE_MAX_POLLS,
        }
    }
}

impl QuiesceConfig {
    /// Poll interval as a [`Duration`]
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Config {
    /// Create a configuration rooted at the given fixtures directory
    #[must_use]
    pub fn with_fixtures_dir(fixtures_dir: impl Into<PathBuf>) -> Self {
        Self {
            fixtures_dir: fixtures_dir.into(),
            ..Self::default()
        }
    }

    /// Load configuration from TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| RetakeError::Config(format!("failed to read config file: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| RetakeError::Config(format!("failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    ///
    /// # Errors
    ///
    /// Returns error if configuration is invalid
    pub fn validate(&self) -> Result<()> {
        if self.fixtures_dir.as_os_str().is_empty() {
            return Err(RetakeError::Config(
                "fixtures_dir cannot be empty".to_string(),
            ));
        }

        if self.quiesce.poll_interval_ms == 0 {
            return Err(RetakeError::Config(
                "quiesce.poll_interval_ms cannot be 0".to_string(),
            ));
        }

        if self.quiesce.max_polls == 0 {
            return Err(RetakeError::Config(
                "quiesce.max_polls cannot be 0".to_string(),
            ));
        }

        Ok(())
    }
}
