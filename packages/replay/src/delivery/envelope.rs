// packages/replay/src/delivery/envelope.rs
//! Replay envelope
//!
//! Serialized as newline-delimited parts: the envelope header, then for each
//! item a JSON item header followed by its payload. The recording payload is
//! `{"segment_id":N}\n` followed by the raw (possibly compressed) recording.

use crate::buffer::event::RecordingPayload;
use crate::delivery::context::ReplayEventContext;
use crate::utils::errors::Result;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

pub const SDK_NAME: &str = "sentry.rust.replay";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SdkInfo {
    pub name: String,
    pub version: String,
}

impl Default for SdkInfo {
    fn default() -> Self {
        Self {
            name: SDK_NAME.to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvelopeHeader {
    pub event_id: String,
    pub sent_at: DateTime<Utc>,
    pub sdk: SdkInfo,
}

/// The `replay_event` item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub event_id: String,
    pub replay_id: String,
    pub segment_id: u32,

    /// Segment end (epoch seconds)
    pub timestamp: f64,

    /// Replay start (epoch seconds); only on the first segment
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replay_start_timestamp: Option<f64>,

    pub urls: Vec<String>,
    pub error_ids: Vec<String>,
    pub trace_ids: Vec<String>,
    pub replay_type: String,
}

/// Everything needed to build one envelope
#[derive(Debug, Clone)]
pub struct SegmentData {
    pub replay_id: String,
    pub segment_id: u32,
    pub replay_type: &'static str,
    pub context: ReplayEventContext,
    pub payload: RecordingPayload,

    /// Time the segment was cut (epoch ms)
    pub timestamp_ms: u64,
}

#[derive(Debug, Clone)]
pub struct ReplayEnvelope {
    pub header: EnvelopeHeader,
    pub event: ReplayEvent,
    pub segment_id: u32,
    pub recording: RecordingPayload,
}

impl ReplayEnvelope {
    pub fn from_segment(segment: SegmentData) -> Self {
        let SegmentData {
            replay_id,
            segment_id,
            replay_type,
            context,
            payload,
            timestamp_ms,
        } = segment;

        let replay_start_timestamp = (segment_id == 0).then(|| {
            let start = match context.earliest_event {
                Some(earliest) => earliest.min(context.initial_timestamp),
                None => context.initial_timestamp,
            };
            to_seconds(start)
        });

        let sent_at = Utc
            .timestamp_millis_opt(timestamp_ms as i64)
            .single()
            .unwrap_or_else(Utc::now);

        Self {
            header: EnvelopeHeader {
                event_id: replay_id.clone(),
                sent_at,
                sdk: SdkInfo::default(),
            },
            event: ReplayEvent {
                event_type: "replay_event".to_string(),
                event_id: replay_id.clone(),
                replay_id,
                segment_id,
                timestamp: to_seconds(timestamp_ms),
                replay_start_timestamp,
                urls: context.urls,
                error_ids: context.error_ids,
                trace_ids: context.trace_ids,
                replay_type: replay_type.to_string(),
            },
            segment_id,
            recording: payload,
        }
    }

    pub fn replay_id(&self) -> &str {
        &self.event.replay_id
    }

    /// Recording item body: segment header line plus the recording
    pub fn recording_body(&self) -> Result<Vec<u8>> {
        let mut body = serde_json::to_vec(&serde_json::json!({ "segment_id": self.segment_id }))?;
        body.push(b'\n');
        body.extend_from_slice(self.recording.as_bytes());
        Ok(body)
    }

    /// Wire form of the envelope
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut out = serde_json::to_vec(&self.header)?;
        out.push(b'\n');

        let event = serde_json::to_vec(&self.event)?;
        out.extend(serde_json::to_vec(&serde_json::json!({ "type": "replay_event" }))?);
        out.push(b'\n');
        out.extend(event);
        out.push(b'\n');

        let recording = self.recording_body()?;
        out.extend(serde_json::to_vec(&serde_json::json!({
            "type": "replay_recording",
            "length": recording.len(),
        }))?);
        out.push(b'\n');
        out.extend(recording);

        Ok(out)
    }
}

fn to_seconds(ms: u64) -> f64 {
    ms as f64 / 1000.0
}
