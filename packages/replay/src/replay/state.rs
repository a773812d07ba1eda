// packages/replay/src/replay/state.rs
//! Mutable pipeline state shared by the container and the delivery controller

use crate::activity::ActivityMonitor;
use crate::buffer::{EventBuffer, PerformanceEntry};
use crate::delivery::context::ReplayEventContext;
use crate::session::{SampleDecision, SessionManager};

/// How buffered events are sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordingMode {
    /// Segments are flushed continuously
    Session,

    /// Events are kept until an error happens
    Buffer,
}

impl RecordingMode {
    pub fn for_decision(sampled: SampleDecision) -> Option<Self> {
        match sampled {
            SampleDecision::Session => Some(RecordingMode::Session),
            SampleDecision::Error => Some(RecordingMode::Buffer),
            SampleDecision::None => None,
        }
    }
}

/// Everything guarded by the container lock
pub struct ReplayState {
    pub session: SessionManager,
    pub buffer: Box<dyn EventBuffer>,
    pub context: ReplayEventContext,
    pub performance_entries: Vec<PerformanceEntry>,
    pub mode: RecordingMode,
    pub enabled: bool,
    pub paused: bool,

    pub activity: ActivityMonitor,

    /// Bumped on every stop and rollover; in-flight flushes from an older
    /// generation leave the state alone
    pub generation: u64,
}

impl ReplayState {
    pub fn new(session: SessionManager, buffer: Box<dyn EventBuffer>, mode: RecordingMode, activity: ActivityMonitor) -> Self {
        let context = ReplayEventContext::new(session.now_ms());
        Self {
            session,
            buffer,
            context,
            performance_entries: Vec::new(),
            mode,
            enabled: true,
            paused: false,
            activity,
            generation: 0,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.enabled && !self.paused
    }
}
