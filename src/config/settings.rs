//! Configuration settings and validation.

use std::path::PathBuf;
use std::time::Duration;

use crate::watcher::{
    IgnoreSources, ReservedFolders, WatcherConfig, DEFAULT_CHANNEL_CAPACITY, DEFAULT_DEBOUNCE,
};
use crate::{Error, Result};

/// Longest accepted debounce window, in milliseconds.
const MAX_DEBOUNCE_MS: u64 = 60_000;

/// Main configuration for a workspace watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Workspace root to watch.
    pub root: PathBuf,

    /// Debounce window in milliseconds.
    pub debounce_ms: u64,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Ignore patterns applied on top of the built-in rules.
    pub ignore_patterns: Vec<String>,

    /// Event batches buffered between the watcher and the router.
    pub channel_capacity: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            debounce_ms: u64::try_from(DEFAULT_DEBOUNCE.as_millis()).unwrap_or(3_000),
            log_level: "info".to_string(),
            ignore_patterns: Vec::new(),
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

impl Config {
    /// Create a new configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate configuration values.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration value is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.root.as_os_str().is_empty() {
            return Err(Error::config("root cannot be empty"));
        }

        if self.debounce_ms == 0 {
            return Err(Error::config("debounce_ms cannot be 0"));
        }

        if self.debounce_ms > MAX_DEBOUNCE_MS {
            return Err(Error::config(format!(
                "debounce_ms cannot exceed {MAX_DEBOUNCE_MS}"
            )));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(Error::config(format!(
                "invalid log level '{}', must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            )));
        }

        if self.channel_capacity == 0 {
            return Err(Error::config("channel_capacity cannot be 0"));
        }

        if self.ignore_patterns.iter().any(|p| p.trim().is_empty()) {
            return Err(Error::config("ignore patterns cannot be blank"));
        }

        Ok(())
    }

    /// Debounce window.
    #[must_use]
    pub const fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    /// Build the watcher configuration.
    #[must_use]
    pub fn watcher_config(&self) -> WatcherConfig {
        WatcherConfig {
            root: self.root.clone(),
            debounce: self.debounce(),
            ignore: IgnoreSources::default(),
            extra_ignore_patterns: self.ignore_patterns.clone(),
            reserved: ReservedFolders::default(),
            channel_capacity: self.channel_capacity,
        }
    }
}
