//! Watcher configuration
//!
//! Every field has a default, so an empty TOML file (or no file at all)
//! yields the standard timings:
//! - 250ms stability poll
//! - 5s quiet period before a batched directory refresh
//! - 250ms / 5 item debounce window

use crate::error::{Result, WatcherError};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Pipeline timings and limits
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WatcherConfig {
    /// Sleep between stability polls of a changed path (default: 250)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Quiet period after the last directory Create before re-watching (default: 5000)
    #[serde(default = "default_batch_refresh_delay_ms")]
    pub batch_refresh_delay_ms: u64,

    /// Debounce window, measured from the first buffered item (default: 250)
    #[serde(default = "default_buffer_window_ms")]
    pub buffer_window_ms: u64,

    /// Debounce count bound (default: 5)
    #[serde(default = "default_buffer_capacity")]
    pub buffer_capacity: usize,

    /// Upper bound on stability checks running at once (default: 64)
    #[serde(default = "default_max_concurrent_checks")]
    pub max_concurrent_checks: usize,
}

impl WatcherConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| WatcherError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&raw)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(raw: &str) -> Result<Self> {
        let config: WatcherConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would stall or spin the pipeline
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_ms == 0 {
            return Err(WatcherError::InvalidConfig(
                "poll_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.buffer_window_ms == 0 {
            return Err(WatcherError::InvalidConfig(
                "buffer_window_ms must be greater than 0".to_string(),
            ));
        }
        if self.batch_refresh_delay_ms == 0 {
            return Err(WatcherError::InvalidConfig(
                "batch_refresh_delay_ms must be greater than 0".to_string(),
            ));
        }
        if self.buffer_capacity == 0 {
            return Err(WatcherError::InvalidConfig(
                "buffer_capacity must be at least 1".to_string(),
            ));
        }
        if self.max_concurrent_checks == 0 {
            return Err(WatcherError::InvalidConfig(
                "max_concurrent_checks must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn batch_refresh_delay(&self) -> Duration {
        Duration::from_millis(self.batch_refresh_delay_ms)
    }

    pub fn buffer_window(&self) -> Duration {
        Duration::from_millis(self.buffer_window_ms)
    }
}

impl Default for WatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            batch_refresh_delay_ms: default_batch_refresh_delay_ms(),
            buffer_window_ms: default_buffer_window_ms(),
            buffer_capacity: default_buffer_capacity(),
            max_concurrent_checks: default_max_concurrent_checks(),
        }
    }
}

fn default_poll_interval_ms() -> u64 {
    250
}

fn default_batch_refresh_delay_ms() -> u64 {
    5000
}

fn default_buffer_window_ms() -> u64 {
    250
}

fn default_buffer_capacity() -> usize {
    5
}

fn default_max_concurrent_checks() -> usize {
    64
}
