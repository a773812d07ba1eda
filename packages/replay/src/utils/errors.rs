// packages/replay/src/utils/errors.rs
//! Error types for the replay pipeline
//!
//! Every variant except [`ReplayError::AlreadyRunning`] and
//! [`ReplayError::ConfigError`] is recoverable: the pipeline logs it and
//! degrades instead of surfacing it to the host application.

use std::time::Duration;
use thiserror::Error;

/// Message used for the diagnostic capture after the last retry failed.
pub const UNABLE_TO_SEND_REPLAY: &str = "Unable to send Replay";

/// Replay pipeline errors
#[derive(Error, Debug)]
pub enum ReplayError {
    #[error("Session storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Session data corrupt: {0}")]
    SessionDataCorrupt(String),

    #[error("Compression worker unavailable: {0}")]
    WorkerUnavailable(String),

    #[error("Compression worker did not answer within {0:?}")]
    WorkerTimeout(Duration),

    #[error("Compression worker failed `{method}`: {message}")]
    WorkerRequestFailed { method: String, message: String },

    #[error("Compression failed: {0}")]
    CompressionFailed(String),

    #[error("Transport failure: {0}")]
    TransportFailure(String),

    #[error("Unable to send Replay - max retries exceeded")]
    RetriesExhausted { attempts: u32, last_error: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Replay recording is already in progress")]
    AlreadyRunning,
}

impl ReplayError {
    /// Whether the pipeline can keep running after this error.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ReplayError::AlreadyRunning | ReplayError::ConfigError(_))
    }
}

impl From<config::ConfigError> for ReplayError {
    fn from(e: config::ConfigError) -> Self {
        ReplayError::ConfigError(e.to_string())
    }
}

impl From<rusqlite::Error> for ReplayError {
    fn from(e: rusqlite::Error) -> Self {
        ReplayError::StorageUnavailable(e.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, ReplayError>;
