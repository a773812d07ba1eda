// packages/replay/src/utils/config.rs
//! Layered pipeline configuration
//!
//! Values come from an optional TOML/YAML/JSON file (path in `REPLAY_CONFIG`,
//! default `replay.toml`) overlaid with `REPLAY__*` environment variables,
//! e.g. `REPLAY__FLUSH_MIN_DELAY_MS=2000`. Every field has a default.

use crate::buffer::compressor::CompressionLevel;
use crate::utils::errors::{ReplayError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default config file looked up when `REPLAY_CONFIG` is unset
pub const DEFAULT_CONFIG_FILE: &str = "replay.toml";

/// Replay pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Quiet period after the last event before a flush (ms)
    pub flush_min_delay_ms: u64,

    /// Upper bound on how long continuous activity can postpone a flush (ms)
    pub flush_max_delay_ms: u64,

    /// Delay before flushing the first checkout of a fresh session (ms)
    pub initial_flush_delay_ms: u64,

    /// Inactivity after which a session expires (ms)
    pub session_idle_timeout_ms: u64,

    /// Maximum age of a session regardless of activity (ms)
    pub max_session_life_ms: u64,

    /// Hidden duration after which returning to the page takes a new checkout (ms)
    pub visibility_change_timeout_ms: u64,

    /// Persist the session in the key/value store across page loads
    pub sticky_session: bool,

    /// Probability of recording a whole session
    pub session_sample_rate: f64,

    /// Probability of keeping an error-capture-only session
    pub error_sample_rate: f64,

    /// Prefer the compression worker buffer
    pub use_compression: bool,

    /// Compression level used by the worker
    pub compression_level: CompressionLevel,

    /// Optional deadline for a single worker round trip (ms)
    pub worker_request_timeout_ms: Option<u64>,

    /// Waits before each retry of a failed send (ms); its length is the retry count
    pub retry_backoff_ms: Vec<u64>,

    /// SQLite file backing the session store (in-memory store when unset)
    pub session_store_path: Option<PathBuf>,

    /// Directory where the directory transport writes envelopes
    pub output_dir: PathBuf,

    /// Logging configuration
    pub observability: ObservabilityConfig,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            flush_min_delay_ms: 5_000,
            flush_max_delay_ms: 15_000,
            initial_flush_delay_ms: 5_000,
            session_idle_timeout_ms: 300_000,  // 5 minutes
            max_session_life_ms: 3_600_000,    // 60 minutes
            visibility_change_timeout_ms: 300_000,
            sticky_session: true,
            session_sample_rate: 0.1,
            error_sample_rate: 1.0,
            use_compression: true,
            compression_level: CompressionLevel::Balanced,
            worker_request_timeout_ms: None,
            retry_backoff_ms: vec![5_000, 10_000, 30_000],
            session_store_path: None,
            output_dir: PathBuf::from("replay-envelopes"),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Default filter directive when `RUST_LOG` is unset
    pub log_level: String,

    /// Emit JSON log lines
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl ReplayConfig {
    /// Load configuration from the config file and environment
    pub fn load() -> Result<Self> {
        let path = std::env::var("REPLAY_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_FILE.to_string());
        Self::load_from(&path)
    }

    /// Load configuration from a specific file (missing file is fine) and environment
    pub fn load_from(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(
                config::Environment::with_prefix("REPLAY")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: ReplayConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.flush_min_delay_ms == 0 {
            return Err(ReplayError::ConfigError("flush_min_delay_ms cannot be 0".to_string()));
        }
        if self.flush_min_delay_ms > self.flush_max_delay_ms {
            return Err(ReplayError::ConfigError(format!(
                "flush_min_delay_ms ({}) cannot exceed flush_max_delay_ms ({})",
                self.flush_min_delay_ms, self.flush_max_delay_ms
            )));
        }
        if self.session_idle_timeout_ms == 0 || self.max_session_life_ms == 0 {
            return Err(ReplayError::ConfigError("session timeouts cannot be 0".to_string()));
        }
        for (name, rate) in [
            ("session_sample_rate", self.session_sample_rate),
            ("error_sample_rate", self.error_sample_rate),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(ReplayError::ConfigError(format!(
                    "{} must be within [0, 1], got {}",
                    name, rate
                )));
            }
        }
        Ok(())
    }

    pub fn flush_min_delay(&self) -> Duration {
        Duration::from_millis(self.flush_min_delay_ms)
    }

    pub fn flush_max_delay(&self) -> Duration {
        Duration::from_millis(self.flush_max_delay_ms)
    }

    pub fn initial_flush_delay(&self) -> Duration {
        Duration::from_millis(self.initial_flush_delay_ms)
    }

    pub fn worker_request_timeout(&self) -> Option<Duration> {
        self.worker_request_timeout_ms.map(Duration::from_millis)
    }

    pub fn retry_backoff(&self) -> Vec<Duration> {
        self.retry_backoff_ms.iter().copied().map(Duration::from_millis).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReplayConfig::default();
        assert_eq!(config.flush_min_delay(), Duration::from_secs(5));
        assert_eq!(config.flush_max_delay(), Duration::from_secs(15));
        assert_eq!(config.session_idle_timeout_ms, 300_000);
        assert_eq!(config.retry_backoff().len(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let inverted = ReplayConfig {
            flush_min_delay_ms: 20_000,
            ..Default::default()
        };
        assert!(inverted.validate().is_err());

        let bad_rate = ReplayConfig {
            session_sample_rate: 1.5,
            ..Default::default()
        };
        assert!(bad_rate.validate().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("replay.toml");
        std::fs::write(
            &path,
            "flush_min_delay_ms = 1000\nsticky_session = false\nretry_backoff_ms = [1, 2]\n",
        )
        .unwrap();

        let config = ReplayConfig::load_from(path.to_str().unwrap()).unwrap();
        assert_eq!(config.flush_min_delay_ms, 1000);
        assert!(!config.sticky_session);
        assert_eq!(config.retry_backoff_ms, vec![1, 2]);
        // untouched fields keep their defaults
        assert_eq!(config.flush_max_delay_ms, 15_000);
    }
}
