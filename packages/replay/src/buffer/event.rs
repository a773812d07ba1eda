// packages/replay/src/buffer/event.rs
//! Recording events and serialized segment payloads
//!
//! Events are opaque to the pipeline except for their type and timestamp;
//! every other top-level field is carried through to the payload unchanged.
//! Breadcrumbs and performance spans produced by the pipeline itself are
//! wrapped into custom events so they replay alongside the DOM recording.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Number, Value};

/// A single recorder event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingEvent {
    /// Recorder event type (see the associated constants)
    #[serde(rename = "type")]
    pub event_type: u8,

    /// Timestamp in milliseconds (seconds are accepted and normalized);
    /// kept as a JSON number so fractional values survive untouched
    pub timestamp: Number,

    /// Event data
    pub data: Value,

    /// Remaining recorder fields, e.g. `delay`
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Largest value still read as seconds since the epoch
const SECONDS_CUTOFF: u64 = 9_999_999_999;

impl RecordingEvent {
    pub const DOM_CONTENT_LOADED: u8 = 0;
    pub const LOAD: u8 = 1;
    pub const FULL_SNAPSHOT: u8 = 2;
    pub const INCREMENTAL_SNAPSHOT: u8 = 3;
    pub const META: u8 = 4;
    pub const CUSTOM: u8 = 5;

    pub fn new(event_type: u8, timestamp: u64, data: Value) -> Self {
        Self {
            event_type,
            timestamp: Number::from(timestamp),
            data,
            extra: Map::new(),
        }
    }

    /// Custom event carrying a breadcrumb
    pub fn breadcrumb(breadcrumb: &Breadcrumb) -> Self {
        Self::new(
            Self::CUSTOM,
            breadcrumb.timestamp_ms(),
            json!({ "tag": "breadcrumb", "payload": breadcrumb }),
        )
    }

    /// Custom event carrying a performance span
    pub fn performance_span(entry: &PerformanceEntry) -> Self {
        Self::new(
            Self::CUSTOM,
            (entry.start * 1000.0) as u64,
            json!({
                "tag": "performanceSpan",
                "payload": {
                    "op": entry.op,
                    "description": entry.name,
                    "startTimestamp": entry.start,
                    "endTimestamp": entry.end,
                    "data": entry.data,
                },
            }),
        )
    }

    /// Timestamp in whole milliseconds; values that look like seconds are scaled up
    pub fn timestamp_ms(&self) -> u64 {
        match self.timestamp.as_u64() {
            Some(ts) if ts > SECONDS_CUTOFF => ts,
            Some(ts) => ts.saturating_mul(1000),
            None => {
                let ts = self.timestamp.as_f64().unwrap_or_default();
                if ts > SECONDS_CUTOFF as f64 {
                    ts as u64
                } else {
                    (ts * 1000.0) as u64
                }
            }
        }
    }

    /// Rewrite a seconds timestamp in place as milliseconds
    pub fn normalize_timestamp(&mut self) {
        if let Some(ts) = self.timestamp.as_u64() {
            if ts <= SECONDS_CUTOFF {
                self.timestamp = Number::from(ts.saturating_mul(1000));
            }
        } else if let Some(ts) = self.timestamp.as_f64() {
            if ts <= SECONDS_CUTOFF as f64 {
                if let Some(millis) = Number::from_f64(ts * 1000.0) {
                    self.timestamp = millis;
                }
            }
        }
    }
}

/// Breadcrumb recorded into the replay
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Breadcrumb {
    /// Seconds since the epoch
    pub timestamp: f64,

    #[serde(rename = "type")]
    pub kind: String,

    pub category: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Breadcrumb {
    pub fn new(category: impl Into<String>, now_ms: u64) -> Self {
        Self {
            timestamp: now_ms as f64 / 1000.0,
            kind: "default".to_string(),
            category: category.into(),
            message: None,
            data: None,
        }
    }

    pub fn timestamp_ms(&self) -> u64 {
        (self.timestamp * 1000.0) as u64
    }
}

/// Auxiliary performance entry queued until the next flush
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceEntry {
    /// Entry type, e.g. `navigation.navigate` or `resource.fetch`
    pub op: String,

    pub name: String,

    /// Start in seconds since the epoch
    pub start: f64,

    /// End in seconds since the epoch
    pub end: f64,

    #[serde(default)]
    pub data: Value,
}

/// Serialized segment content returned by `EventBuffer::finish`
#[derive(Debug, Clone, PartialEq)]
pub enum RecordingPayload {
    /// JSON array text (array buffer)
    Text(String),

    /// DEFLATE-compressed (zlib) JSON array (worker buffer)
    Compressed(Bytes),
}

impl RecordingPayload {
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            RecordingPayload::Text(text) => text.as_bytes(),
            RecordingPayload::Compressed(bytes) => bytes.as_ref(),
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_compressed(&self) -> bool {
        matches!(self, RecordingPayload::Compressed(_))
    }
}
