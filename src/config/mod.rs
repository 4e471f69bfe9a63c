//! # Pipeline Configuration System
//!
//! Configuration for polling sources, push sources, the processor host and logging.
//! Every section deserializes with defaults so a partial YAML file (or none at all)
//! yields a complete, validated configuration.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pipeline_core::config::ConfigManager;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = ConfigManager::load()?;
//!
//! let interval = manager.config().polling.interval();
//! let buffer = manager.config().push.buffer_size;
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod loader;

use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use error::{ConfigResult, ConfigurationError};
pub use loader::ConfigManager;

use crate::constants::{DEFAULT_POLLING_INTERVAL_MS, DEFAULT_PUSH_BUFFER_SIZE};

/// Root configuration structure mirroring pipeline.yaml
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Polling source settings
    pub polling: PollingConfig,

    /// Push source settings
    pub push: PushSourceConfig,

    /// Message processor host settings
    pub host: HostConfig,

    /// Logging settings
    pub logging: LoggingConfig,
}

impl PipelineConfig {
    /// Validate every section
    pub fn validate(&self) -> ConfigResult<()> {
        self.polling.validate()?;
        self.push.validate()?;
        self.host.validate()?;
        self.logging.validate()?;
        Ok(())
    }
}

/// Polling source configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Delay between two poll iterations, in milliseconds
    pub interval_ms: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_ms: DEFAULT_POLLING_INTERVAL_MS,
        }
    }
}

impl PollingConfig {
    /// Create a polling configuration with the given interval
    pub fn with_interval(interval: Duration) -> Self {
        Self {
            interval_ms: interval.as_millis() as u64,
        }
    }

    /// Polling interval as a duration
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.interval_ms == 0 {
            return Err(ConfigurationError::invalid_value(
                "polling.interval_ms",
                "0",
                "polling interval must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Push source configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct PushSourceConfig {
    /// Capacity of the bounded ingress channel
    pub buffer_size: usize,
}

impl Default for PushSourceConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_PUSH_BUFFER_SIZE,
        }
    }
}

impl PushSourceConfig {
    pub fn validate(&self) -> ConfigResult<()> {
        if self.buffer_size == 0 {
            return Err(ConfigurationError::invalid_value(
                "push.buffer_size",
                "0",
                "ingress buffer must hold at least one payload",
            ));
        }
        Ok(())
    }
}

/// Policy for processors registered under the same name in one host
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateNamePolicy {
    /// Fail `build()` with a duplicate name error
    #[default]
    Reject,
    /// Accept duplicates; forwards are delivered to every processor with the name
    DeliverToAll,
}

/// Message processor host configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct HostConfig {
    /// How duplicate processor names are handled at build time
    pub duplicate_names: DuplicateNamePolicy,

    /// Upper bound on how long `stop` waits for processors to drain
    pub shutdown_timeout_ms: Option<u64>,
}

impl HostConfig {
    /// Shutdown timeout as a duration, if one is configured
    pub fn shutdown_timeout(&self) -> Option<Duration> {
        self.shutdown_timeout_ms.map(Duration::from_millis)
    }

    /// Set the duplicate name policy
    pub fn with_duplicate_names(mut self, policy: DuplicateNamePolicy) -> Self {
        self.duplicate_names = policy;
        self
    }

    /// Set the shutdown timeout
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.shutdown_timeout_ms == Some(0) {
            return Err(ConfigurationError::invalid_value(
                "host.shutdown_timeout_ms",
                "0",
                "omit the field to wait without a bound",
            ));
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Explicit log level; the environment default is used when absent
    pub level: Option<String>,

    /// Emit JSON formatted log lines
    pub json: bool,
}

impl LoggingConfig {
    const LEVELS: [&'static str; 5] = ["trace", "debug", "info", "warn", "error"];

    pub fn validate(&self) -> ConfigResult<()> {
        if let Some(level) = &self.level {
            if !Self::LEVELS.contains(&level.to_lowercase().as_str()) {
                return Err(ConfigurationError::invalid_value(
                    "logging.level",
                    level.clone(),
                    format!("expected one of {}", Self::LEVELS.join(", ")),
                ));
            }
        }
        Ok(())
    }
}
