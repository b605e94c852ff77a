//! Configuration structures for the acquisition runtime.
//!
//! Supports TOML deserialization with sensible defaults for
//! development and explicit values for deployment.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Top-level acquisition configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DaqConfig {
    /// Interval between samples while recording. The shipped system is a
    /// fixed-function 1 Hz logger; this is resolved once at startup, not a
    /// runtime-variable rate.
    #[serde(with = "humantime_serde")]
    pub sample_period: Duration,

    /// Poll interval while idle, waiting for the start button.
    #[serde(with = "humantime_serde")]
    pub idle_poll: Duration,

    /// Poll interval for the elapsed-time check while recording.
    #[serde(with = "humantime_serde")]
    pub record_poll: Duration,

    /// Emit human-readable status lines on the serial channel.
    pub verbose: bool,

    /// Simulated board configuration.
    pub board: BoardConfig,

    /// Real-time configuration for the tick thread.
    pub realtime: RealtimeConfig,
}

impl Default for DaqConfig {
    fn default() -> Self {
        Self {
            sample_period: Duration::from_secs(1),
            idle_poll: Duration::from_millis(10),
            record_poll: Duration::from_millis(1),
            verbose: false,
            board: BoardConfig::default(),
            realtime: RealtimeConfig::default(),
        }
    }
}

impl DaqConfig {
    /// Sample period in whole milliseconds, as compared against the tick
    /// counter. Saturates at `u32::MAX` ms.
    #[must_use]
    pub fn sample_period_ms(&self) -> u32 {
        u32::try_from(self.sample_period.as_millis()).unwrap_or(u32::MAX)
    }
}

/// Initial line levels for the simulated board.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct BoardConfig {
    /// Initial level of the TD (target-detect) line.
    pub td: bool,

    /// Initial level of the PD (presence-detect) line.
    pub pd: bool,
}

/// Real-time scheduling configuration for the tick thread.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RealtimeConfig {
    /// Enable real-time scheduling (requires privileges).
    pub enabled: bool,

    /// Scheduler policy: "fifo" or "rr" (round-robin).
    pub policy: SchedPolicy,

    /// Scheduler priority (1-99 for RT policies).
    pub priority: u8,

    /// Lock all memory pages (mlockall).
    pub lock_memory: bool,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            policy: SchedPolicy::Fifo,
            priority: 50,
            lock_memory: false,
        }
    }
}

/// Scheduler policy for the tick thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SchedPolicy {
    /// SCHED_FIFO: First-in-first-out real-time.
    #[default]
    Fifo,
    /// SCHED_RR: Round-robin real-time.
    Rr,
    /// SCHED_OTHER: Normal time-sharing (non-RT).
    Other,
}

impl DaqConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is invalid.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(ConfigError::Parse)
    }

    /// Serialize configuration to TOML string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::Serialize)
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File I/O error.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// TOML parsing error.
    #[error("failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialization error.
    #[error("failed to serialize TOML: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Serde helper module for `Duration` using humantime format.
mod humantime_serde {
    use serde::{self, Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let s = humantime::format_duration(*duration).to_string();
        serializer.serialize_str(&s)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        humantime::parse_duration(&s).map_err(serde::de::Error::custom)
    }
}
