// packages/replay/src/session/mod.rs
//! Replay session identity and lifecycle
//!
//! - **store**: key/value persistence of the current session
//! - **manager**: load/touch/rollover of the live session

pub mod manager;
pub mod store;

pub use manager::{SessionManager, SessionOptions};
pub use store::{KeyValueStore, MemoryStore, SqliteStore};

use crate::utils::ids::new_replay_id;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Sampling outcome for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "SampledRepr", into = "SampledRepr")]
pub enum SampleDecision {
    /// Record and send the whole session
    Session,

    /// Keep a rolling buffer and only send once an error happens
    Error,

    /// Not sampled
    None,
}

impl SampleDecision {
    /// Draw a decision from the configured rates
    pub fn sample(session_rate: f64, error_rate: f64) -> Self {
        let mut rng = rand::thread_rng();
        if rng.gen::<f64>() < session_rate {
            SampleDecision::Session
        } else if error_rate > 0.0 {
            SampleDecision::Error
        } else {
            SampleDecision::None
        }
    }

    /// Tag reported as `replay_type`
    pub fn replay_type(&self) -> &'static str {
        match self {
            SampleDecision::Session => "session",
            SampleDecision::Error | SampleDecision::None => "buffer",
        }
    }
}

/// Stored form: `"session"`, `"buffer"` or `false`
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum SampledRepr {
    Flag(bool),
    Mode(String),
}

impl TryFrom<SampledRepr> for SampleDecision {
    type Error = String;

    fn try_from(repr: SampledRepr) -> Result<Self, String> {
        match repr {
            SampledRepr::Flag(false) => Ok(SampleDecision::None),
            SampledRepr::Mode(mode) if mode == "session" => Ok(SampleDecision::Session),
            SampledRepr::Mode(mode) if mode == "buffer" => Ok(SampleDecision::Error),
            SampledRepr::Flag(true) => Err("`sampled: true` is not a valid decision".to_string()),
            SampledRepr::Mode(mode) => Err(format!("unknown sample decision `{}`", mode)),
        }
    }
}

impl From<SampleDecision> for SampledRepr {
    fn from(decision: SampleDecision) -> Self {
        match decision {
            SampleDecision::Session => SampledRepr::Mode("session".to_string()),
            SampleDecision::Error => SampledRepr::Mode("buffer".to_string()),
            SampleDecision::None => SampledRepr::Flag(false),
        }
    }
}

/// Expiry thresholds in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionExpiry {
    pub idle_timeout_ms: u64,
    pub max_age_ms: u64,
}

/// A replay session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// 32 hex characters
    pub id: String,

    /// Creation time (epoch ms)
    pub started: u64,

    /// Last user activity (epoch ms)
    pub last_activity: u64,

    /// Id of the next segment to send
    pub segment_id: u32,

    pub sampled: SampleDecision,

    /// Session this one rolled over from
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_session_id: Option<String>,
}

impl Session {
    pub fn new(sampled: SampleDecision, now_ms: u64, previous_session_id: Option<String>) -> Self {
        Self {
            id: new_replay_id(),
            started: now_ms,
            last_activity: now_ms,
            segment_id: 0,
            sampled,
            previous_session_id,
        }
    }

    /// Idle for longer than the idle timeout, or older than the max age
    pub fn is_expired(&self, now_ms: u64, expiry: SessionExpiry) -> bool {
        now_ms.saturating_sub(self.last_activity) > expiry.idle_timeout_ms
            || now_ms.saturating_sub(self.started) > expiry.max_age_ms
    }
}
