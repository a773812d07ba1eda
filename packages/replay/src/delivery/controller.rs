// packages/replay/src/delivery/controller.rs
//! Segment delivery
//!
//! A flush cuts the buffered events into a segment, claims the next segment
//! id and sends the envelope, retrying on transport failures. The state lock
//! is only held while cutting the segment and while claiming the id, never
//! across an await.

use crate::buffer::event::RecordingEvent;
use crate::buffer::EventBuffer;
use crate::delivery::envelope::{ReplayEnvelope, SegmentData};
use crate::delivery::retry::{RetryMachine, RetryPolicy, RetryState, RetryStep};
use crate::delivery::transport::{ExceptionCapture, Transport};
use crate::observability::{EVENTS_DISCARDED, SEGMENTS_DROPPED, SEGMENTS_SENT, SEGMENT_BYTES, SEND_RETRIES};
use crate::replay::state::ReplayState;
use crate::utils::errors::ReplayError;
use parking_lot::Mutex;
use std::mem;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Result of one `run_flush`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// Nothing buffered; no segment produced
    Empty,
    /// The session expired; buffered events were discarded
    Expired,
    /// Encoding failed; the segment was dropped without claiming an id
    EncodeFailed,
    /// The session changed while encoding
    Stale,
    /// The container was stopped
    Stopped,
    Sent { segment_id: u32, attempts: u32 },
    GivenUp { segment_id: u32, attempts: u32 },
}

pub struct DeliveryController {
    state: Arc<Mutex<ReplayState>>,
    transport: Arc<dyn Transport>,
    capture: Arc<dyn ExceptionCapture>,
    policy: RetryPolicy,
}

impl DeliveryController {
    pub fn new(
        state: Arc<Mutex<ReplayState>>,
        transport: Arc<dyn Transport>,
        capture: Arc<dyn ExceptionCapture>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            state,
            transport,
            capture,
            policy,
        }
    }

    /// Cut, encode and send one segment
    pub async fn run_flush(&self) -> FlushOutcome {
        let (replay_id, replay_type, context, encoding, generation) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            if !state.enabled {
                return FlushOutcome::Stopped;
            }

            if state.session.is_expired() {
                let discarded = state.buffer.len();
                state.buffer.clear();
                state.performance_entries.clear();
                if discarded > 0 {
                    debug!("Session expired, discarded {} buffered events", discarded);
                    metrics::counter!(EVENTS_DISCARDED).increment(discarded as u64);
                }
                return FlushOutcome::Expired;
            }

            for entry in mem::take(&mut state.performance_entries) {
                let event = RecordingEvent::performance_span(&entry);
                state.context.observe_event(event.timestamp_ms());
                if let Err(e) = state.buffer.add_event(event, false) {
                    warn!("Failed to add performance span: {}", e);
                }
            }

            if state.buffer.is_empty() {
                return FlushOutcome::Empty;
            }

            let session = state.session.session();
            (
                session.id.clone(),
                session.sampled.replay_type(),
                state.context.snapshot(),
                state.buffer.finish(),
                state.generation,
            )
        };

        let payload = match encoding.await {
            Ok(payload) => payload,
            Err(e) => {
                warn!("Dropping segment of replay {}, encoding failed: {}", replay_id, e);
                return FlushOutcome::EncodeFailed;
            }
        };

        let (segment_id, now) = {
            let mut state = self.state.lock();
            if !state.enabled || state.generation != generation {
                return FlushOutcome::Stopped;
            }
            if state.session.session().id != replay_id {
                debug!("Session changed while encoding, dropping segment of {}", replay_id);
                return FlushOutcome::Stale;
            }
            (state.session.next_segment_id(), state.session.now_ms())
        };

        metrics::histogram!(SEGMENT_BYTES).record(payload.len() as f64);
        let envelope = ReplayEnvelope::from_segment(SegmentData {
            replay_id,
            segment_id,
            replay_type,
            context: context.clone(),
            payload,
            timestamp_ms: now,
        });

        let outcome = self.send_with_retry(&envelope, generation).await;

        let mut state = self.state.lock();
        if state.generation == generation {
            state.context.clear_delivered(&context);
        }
        outcome
    }

    async fn send_with_retry(&self, envelope: &ReplayEnvelope, generation: u64) -> FlushOutcome {
        let segment_id = envelope.segment_id;
        let mut machine = RetryMachine::new(self.policy.clone());
        let mut last_error = String::new();

        while machine.next_step() == RetryStep::Send {
            let result = self.transport.send(envelope).await;
            if let Err(e) = &result {
                warn!("Failed to send segment {}: {}", segment_id, e);
                last_error = e.to_string();
            }

            if let RetryStep::Wait(wait) = machine.on_result(result.is_ok()) {
                metrics::counter!(SEND_RETRIES).increment(1);
                tokio::time::sleep(wait).await;

                if self.state.lock().generation != generation {
                    debug!("Stopped while retrying segment {}", segment_id);
                    return FlushOutcome::Stopped;
                }
            }
        }

        match machine.state() {
            RetryState::Success { attempts } => {
                info!("Sent replay segment {} of {}", segment_id, envelope.replay_id());
                metrics::counter!(SEGMENTS_SENT).increment(1);
                FlushOutcome::Sent { segment_id, attempts }
            }
            RetryState::GivenUp { attempts } => {
                let err = ReplayError::RetriesExhausted { attempts, last_error };
                error!("{} (segment {}, {} attempts)", err, segment_id, attempts);
                self.capture.capture_exception(&err);
                metrics::counter!(SEGMENTS_DROPPED).increment(1);
                FlushOutcome::GivenUp { segment_id, attempts }
            }
            other => {
                // next_step only stops sending in a terminal state
                warn!("Retry loop ended in {:?}", other);
                FlushOutcome::Stopped
            }
        }
    }
}
