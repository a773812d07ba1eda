// packages/replay/src/replay/container.rs
//! Replay container
//!
//! Owns the session, the event buffer, the flush scheduler and the delivery
//! controller for one recording. The host feeds it recorder events and
//! activity signals; it never returns an error for those, degrading and
//! logging instead.

use crate::activity::{ActivityDecision, ActivityMonitor, ActivitySignal};
use crate::buffer::{create_event_buffer, ArrayEventBuffer, Breadcrumb, EventBuffer, PerformanceEntry, RecordingEvent};
use crate::delivery::controller::DeliveryController;
use crate::delivery::retry::RetryPolicy;
use crate::delivery::transport::{ExceptionCapture, Transport};
use crate::observability::{EVENTS_DISCARDED, WORKER_FALLBACKS};
use crate::replay::state::{RecordingMode, ReplayState};
use crate::scheduler::{FlushRunner, FlushScheduler, FlushState};
use crate::session::store::{clear_session, KeyValueStore};
use crate::session::{Session, SessionManager, SessionOptions};
use crate::utils::clock::Clock;
use crate::utils::config::ReplayConfig;
use crate::utils::errors::{ReplayError, Result, UNABLE_TO_SEND_REPLAY};
use async_trait::async_trait;
use parking_lot::Mutex;
use rand::Rng;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

/// The DOM recorder driving this container
pub trait Recorder: Send + Sync {
    /// Ask the recorder to emit a full snapshot
    fn take_full_snapshot(&self, is_checkout: bool);
}

/// Error reported by the host SDK
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorEvent {
    pub event_id: String,
    pub message: String,
}

/// Collaborators supplied by the host
#[derive(Clone)]
pub struct ReplayDeps {
    pub store: Arc<dyn KeyValueStore>,
    pub transport: Arc<dyn Transport>,
    pub capture: Arc<dyn ExceptionCapture>,
    pub recorder: Arc<dyn Recorder>,
    pub clock: Arc<dyn Clock>,
}

/// Runs flushes on behalf of the scheduler
struct FlushJob {
    controller: Arc<DeliveryController>,
}

#[async_trait]
impl FlushRunner for FlushJob {
    async fn run_flush(&self) {
        let outcome = self.controller.run_flush().await;
        debug!("Flush finished: {:?}", outcome);
    }
}

#[derive(Clone)]
struct Running {
    state: Arc<Mutex<ReplayState>>,
    scheduler: Arc<FlushScheduler>,
}

pub struct ReplayContainer {
    config: ReplayConfig,
    deps: ReplayDeps,
    running: Mutex<Option<Running>>,
}

impl ReplayContainer {
    pub fn new(config: ReplayConfig, deps: ReplayDeps) -> Self {
        Self {
            config,
            deps,
            running: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &ReplayConfig {
        &self.config
    }

    /// Load or create the session and start recording.
    ///
    /// Must be called within a tokio runtime. An unsampled session leaves
    /// the container disabled.
    pub fn start(&self) -> Result<()> {
        let mut running = self.running.lock();
        if running.is_some() {
            return Err(ReplayError::AlreadyRunning);
        }

        let runtime = Handle::try_current()
            .map_err(|e| ReplayError::ConfigError(format!("A tokio runtime is required: {}", e)))?;

        let session = SessionManager::load(
            Arc::clone(&self.deps.store),
            Arc::clone(&self.deps.clock),
            SessionOptions::from_config(&self.config),
        );

        let mode = match RecordingMode::for_decision(session.session().sampled) {
            Some(mode) => mode,
            None => {
                info!("Session {} not sampled, replay stays off", session.session().id);
                return Ok(());
            }
        };

        info!("Starting replay {} in {:?} mode", session.session().id, mode);

        let state = Arc::new(Mutex::new(ReplayState::new(
            session,
            create_event_buffer(&self.config),
            mode,
            ActivityMonitor::new(self.config.visibility_change_timeout_ms),
        )));
        let controller = Arc::new(DeliveryController::new(
            Arc::clone(&state),
            Arc::clone(&self.deps.transport),
            Arc::clone(&self.deps.capture),
            RetryPolicy::new(self.config.retry_backoff()),
        ));
        let scheduler = Arc::new(FlushScheduler::start(
            Arc::new(FlushJob { controller }),
            self.config.flush_min_delay(),
            self.config.flush_max_delay(),
            runtime,
        ));

        *running = Some(Running { state, scheduler });
        Ok(())
    }

    fn running(&self) -> Option<Running> {
        self.running.lock().clone()
    }

    pub fn is_enabled(&self) -> bool {
        self.running().is_some()
    }

    pub fn is_paused(&self) -> bool {
        self.running().map_or(false, |r| r.state.lock().paused)
    }

    pub fn recording_mode(&self) -> Option<RecordingMode> {
        self.running().map(|r| r.state.lock().mode)
    }

    pub fn session(&self) -> Option<Session> {
        self.running().map(|r| r.state.lock().session.session().clone())
    }

    pub fn flush_state(&self) -> Option<FlushState> {
        self.running().map(|r| r.scheduler.state())
    }

    /// Recorder callback
    pub fn handle_recording_emit(&self, mut event: RecordingEvent, is_checkout: bool) {
        let Some(running) = self.running() else {
            return;
        };

        let (mode, schedule_initial, need_snapshot) = {
            let mut guard = running.state.lock();
            let state = &mut *guard;
            if !state.is_recording() {
                return;
            }

            let now = state.session.now_ms();
            event.normalize_timestamp();
            let timestamp = event.timestamp_ms();
            if now.saturating_sub(timestamp) > self.config.session_idle_timeout_ms {
                debug!("Discarding event from {} ({}ms old)", timestamp, now - timestamp);
                metrics::counter!(EVENTS_DISCARDED).increment(1);
                return;
            }
            if state.session.is_expired() {
                debug!("Session expired, discarding event until next activity");
                metrics::counter!(EVENTS_DISCARDED).increment(1);
                return;
            }

            let mut need_snapshot = false;
            if let Err(e) = state.buffer.add_event(event.clone(), is_checkout) {
                match e {
                    ReplayError::WorkerUnavailable(_) | ReplayError::WorkerTimeout(_) => {
                        warn!("Compression worker lost, switching to array buffer: {}", e);
                        metrics::counter!(WORKER_FALLBACKS).increment(1);
                        state.buffer.destroy();
                        state.buffer = Box::new(ArrayEventBuffer::new());
                        if let Err(e) = state.buffer.add_event(event, is_checkout) {
                            warn!("Failed to buffer event: {}", e);
                            return;
                        }
                        need_snapshot = !is_checkout;
                    }
                    other => {
                        warn!("Failed to buffer event: {}", other);
                        return;
                    }
                }
            }
            state.context.observe_event(timestamp);

            let session = state.session.session();
            let schedule_initial = is_checkout && session.previous_session_id.is_none();
            (state.mode, schedule_initial, need_snapshot)
        };

        if mode == RecordingMode::Session {
            if schedule_initial {
                running.scheduler.flush_in(self.config.initial_flush_delay());
            } else if !is_checkout {
                running.scheduler.debounce();
            }
        }

        if need_snapshot {
            self.deps.recorder.take_full_snapshot(true);
        }
    }

    /// Record a breadcrumb into the replay
    pub fn add_breadcrumb(&self, breadcrumb: Breadcrumb) {
        let Some(running) = self.running() else {
            return;
        };

        let mode = {
            let mut state = running.state.lock();
            if !state.is_recording() || state.session.is_expired() {
                return;
            }
            if !push_breadcrumb(&mut state, &breadcrumb) {
                return;
            }
            state.mode
        };

        if mode == RecordingMode::Session {
            running.scheduler.debounce();
        }
    }

    /// Apply a user or visibility signal
    pub fn handle_signal(&self, signal: ActivitySignal) {
        let Some(running) = self.running() else {
            return;
        };

        let (decision, mode, recorded) = {
            let mut guard = running.state.lock();
            let state = &mut *guard;
            if !state.enabled {
                return;
            }
            let now = state.session.now_ms();
            let expired = state.session.is_expired();
            let decision = state.activity.classify(signal, now, expired);

            let mut recorded = false;
            if let Some(category) = decision.breadcrumb() {
                if !expired && !state.paused {
                    recorded = push_breadcrumb(state, &Breadcrumb::new(category, now));
                }
            }
            if decision == ActivityDecision::ExtendIdle {
                state.session.touch();
            }
            (decision, state.mode, recorded)
        };

        match decision {
            ActivityDecision::Background { .. } => {
                if mode == RecordingMode::Session {
                    running.scheduler.flush_now();
                }
            }
            ActivityDecision::NewCheckout { rollover: true, .. } | ActivityDecision::Rollover => {
                self.rollover(&running);
            }
            ActivityDecision::NewCheckout { rollover: false, .. } => {
                debug!("Back after the visibility timeout, taking a new checkout");
                self.deps.recorder.take_full_snapshot(true);
            }
            ActivityDecision::Continue { .. } => {
                if recorded && mode == RecordingMode::Session {
                    running.scheduler.debounce();
                }
            }
            ActivityDecision::ExtendIdle => {}
        }
    }

    /// Replace an expired session: stale events are dropped and a new
    /// checkout is requested instead of flushing them
    fn rollover(&self, running: &Running) {
        let sampled = {
            let mut state = running.state.lock();
            let discarded = state.buffer.len();
            state.buffer.clear();
            state.performance_entries.clear();
            if discarded > 0 {
                debug!("Discarded {} events buffered before the gap", discarded);
                metrics::counter!(EVENTS_DISCARDED).increment(discarded as u64);
            }

            let previous = state.session.session().id.clone();
            let session = state.session.rollover().clone();
            info!("Session {} expired, continuing as {}", previous, session.id);

            let now = state.session.now_ms();
            state.context.reset(now);
            state.generation += 1;
            match RecordingMode::for_decision(session.sampled) {
                Some(mode) => {
                    state.mode = mode;
                    true
                }
                None => false,
            }
        };

        running.scheduler.cancel();

        if sampled {
            self.deps.recorder.take_full_snapshot(true);
        } else {
            info!("New session not sampled, stopping replay");
            self.stop();
        }
    }

    /// Error reported by the host SDK
    ///
    /// In buffer mode a sampled error sends what is buffered and switches
    /// the container to session mode.
    pub async fn handle_error_event(&self, error: &ErrorEvent) {
        if error.message.starts_with(UNABLE_TO_SEND_REPLAY) {
            return;
        }
        let Some(running) = self.running() else {
            return;
        };

        let mode = {
            let mut state = running.state.lock();
            if !state.enabled {
                return;
            }
            state.context.add_error_id(error.event_id.clone());
            state.mode
        };

        if mode != RecordingMode::Buffer {
            return;
        }
        if rand::thread_rng().gen::<f64>() >= self.config.error_sample_rate {
            debug!("Error {} not sampled for replay", error.event_id);
            return;
        }

        info!("Error {} captured, sending buffered replay", error.event_id);
        running.scheduler.flush_now();
        running.scheduler.settled().await;

        {
            let mut state = running.state.lock();
            if !state.enabled {
                return;
            }
            state.mode = RecordingMode::Session;
            state.session.touch();
        }
        self.deps.recorder.take_full_snapshot(true);
    }

    /// Trace id of a finished transaction
    pub fn handle_transaction(&self, trace_id: &str) {
        if let Some(running) = self.running() {
            running.state.lock().context.add_trace_id(trace_id);
        }
    }

    /// Navigation; counts as user activity
    pub fn add_url(&self, url: &str) {
        self.handle_signal(ActivitySignal::UserInteraction);
        if let Some(running) = self.running() {
            running.state.lock().context.add_url(url);
        }
    }

    /// Queue a performance entry for the next segment
    pub fn add_performance_entry(&self, entry: PerformanceEntry) {
        if let Some(running) = self.running() {
            let mut state = running.state.lock();
            if state.is_recording() {
                state.performance_entries.push(entry);
            }
        }
    }

    /// Flush now (coalesced with a running flush)
    pub fn flush(&self) {
        if let Some(running) = self.running() {
            running.scheduler.flush_now();
        }
    }

    /// Flush now and wait until no flush is running or pending
    pub async fn flush_and_wait(&self) {
        if let Some(running) = self.running() {
            running.scheduler.flush_now();
            running.scheduler.settled().await;
        }
    }

    /// Stop accepting events
    pub fn pause(&self) {
        if let Some(running) = self.running() {
            running.state.lock().paused = true;
            running.scheduler.cancel();
            debug!("Replay paused");
        }
    }

    /// Accept events again; takes a new checkout if the session is still valid
    pub fn resume(&self) {
        let Some(running) = self.running() else {
            return;
        };

        let valid = {
            let mut state = running.state.lock();
            if !state.paused {
                return;
            }
            state.paused = false;
            !state.session.is_expired()
        };

        debug!("Replay resumed");
        if valid {
            self.deps.recorder.take_full_snapshot(true);
        }
    }

    /// Stop recording. Timers are cleared; a send already in flight
    /// completes but its result is ignored. The stored session is kept.
    pub fn stop(&self) {
        let Some(running) = self.running.lock().take() else {
            return;
        };

        running.scheduler.stop();
        let mut state = running.state.lock();
        state.enabled = false;
        state.generation += 1;
        state.buffer.destroy();
        info!("Replay {} stopped", state.session.session().id);
    }

    /// Flush what is buffered, then stop
    pub async fn shutdown(&self) {
        self.flush_and_wait().await;
        self.stop();
    }

    /// Stop and delete the stored session
    pub fn clear_session(&self) {
        self.stop();
        clear_session(self.deps.store.as_ref());
    }
}

impl Drop for ReplayContainer {
    fn drop(&mut self) {
        self.stop();
    }
}

fn push_breadcrumb(state: &mut ReplayState, breadcrumb: &Breadcrumb) -> bool {
    let event = RecordingEvent::breadcrumb(breadcrumb);
    let timestamp = event.timestamp_ms();
    match state.buffer.add_event(event, false) {
        Ok(()) => {
            state.context.observe_event(timestamp);
            true
        }
        Err(e) => {
            warn!("Failed to add breadcrumb {}: {}", breadcrumb.category, e);
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferKind;
    use crate::delivery::envelope::ReplayEnvelope;
    use crate::session::store::{fetch_session, MemoryStore};
    use crate::utils::clock::TokioClock;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct CollectingTransport {
        envelopes: Mutex<Vec<ReplayEnvelope>>,
    }

    #[async_trait]
    impl Transport for CollectingTransport {
        async fn send(&self, envelope: &ReplayEnvelope) -> Result<()> {
            self.envelopes.lock().push(envelope.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct SnapshotRecorder {
        calls: AtomicUsize,
    }

    impl Recorder for SnapshotRecorder {
        fn take_full_snapshot(&self, is_checkout: bool) {
            assert!(is_checkout);
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct NoCapture;

    impl ExceptionCapture for NoCapture {
        fn capture_exception(&self, error: &ReplayError) {
            panic!("unexpected capture: {}", error);
        }
    }

    struct Harness {
        container: ReplayContainer,
        transport: Arc<CollectingTransport>,
        recorder: Arc<SnapshotRecorder>,
        clock: Arc<TokioClock>,
        store: Arc<MemoryStore>,
    }

    impl Harness {
        fn new(config: ReplayConfig) -> Self {
            let transport = Arc::new(CollectingTransport::default());
            let recorder = Arc::new(SnapshotRecorder::default());
            let clock = Arc::new(TokioClock::anchored_at(1_700_000_000_000));
            let store = Arc::new(MemoryStore::new());

            let container = ReplayContainer::new(
                config,
                ReplayDeps {
                    store: store.clone(),
                    transport: transport.clone(),
                    capture: Arc::new(NoCapture),
                    recorder: recorder.clone(),
                    clock: clock.clone(),
                },
            );

            Self {
                container,
                transport,
                recorder,
                clock,
                store,
            }
        }

        fn started(config: ReplayConfig) -> Self {
            let harness = Self::new(config);
            harness.container.start().unwrap();
            harness
        }

        fn event(&self) -> RecordingEvent {
            RecordingEvent::new(
                RecordingEvent::INCREMENTAL_SNAPSHOT,
                self.clock.now_ms(),
                json!({ "source": 2 }),
            )
        }

        fn checkout(&self) -> RecordingEvent {
            RecordingEvent::new(RecordingEvent::FULL_SNAPSHOT, self.clock.now_ms(), json!({ "node": {} }))
        }

        fn emit(&self, event: &RecordingEvent, is_checkout: bool) {
            self.container.handle_recording_emit(event.clone(), is_checkout);
        }

        fn sent(&self) -> Vec<ReplayEnvelope> {
            self.transport.envelopes.lock().clone()
        }

        fn snapshots(&self) -> usize {
            self.recorder.calls.load(Ordering::SeqCst)
        }
    }

    fn config() -> ReplayConfig {
        ReplayConfig {
            use_compression: false,
            session_sample_rate: 1.0,
            error_sample_rate: 0.0,
            ..Default::default()
        }
    }

    fn decode(envelope: &ReplayEnvelope) -> Vec<RecordingEvent> {
        serde_json::from_slice(envelope.recording.as_bytes()).unwrap()
    }

    async fn sleep_secs(secs: u64) {
        tokio::time::sleep(Duration::from_secs(secs)).await;
    }

    /// Let spawned flush tasks run without reaching any timer
    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice() {
        let h = Harness::started(config());
        assert!(h.container.is_enabled());
        assert!(matches!(h.container.start(), Err(ReplayError::AlreadyRunning)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unsampled_session_stays_off() {
        let h = Harness::new(ReplayConfig {
            session_sample_rate: 0.0,
            error_sample_rate: 0.0,
            ..config()
        });
        h.container.start().unwrap();
        assert!(!h.container.is_enabled());

        h.emit(&h.checkout(), true);
        sleep_secs(30).await;
        assert!(h.sent().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_checkout_then_debounce() {
        let h = Harness::started(config());
        let checkout = h.checkout();
        h.emit(&checkout, true);

        sleep_secs(4).await;
        assert!(h.sent().is_empty());
        sleep_secs(2).await;

        let sent = h.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].segment_id, 0);
        assert!(sent[0].event.replay_start_timestamp.is_some());
        assert_eq!(decode(&sent[0]), vec![checkout]);

        let first = h.event();
        h.emit(&first, false);
        sleep_secs(3).await;
        let second = h.event();
        h.emit(&second, false);
        sleep_secs(4).await;
        assert_eq!(h.sent().len(), 1);

        sleep_secs(2).await;
        let sent = h.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].segment_id, 1);
        assert_eq!(decode(&sent[1]), vec![first, second]);
        assert_eq!(h.container.session().unwrap().segment_id, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_return_after_visibility_timeout_takes_checkout() {
        let h = Harness::started(ReplayConfig {
            visibility_change_timeout_ms: 60_000,
            ..config()
        });
        h.emit(&h.checkout(), true);
        sleep_secs(6).await;
        let id = h.container.session().unwrap().id;

        h.container.handle_signal(ActivitySignal::VisibilityHidden);
        sleep_secs(100).await;
        h.container.handle_signal(ActivitySignal::VisibilityVisible);

        assert_eq!(h.snapshots(), 1);
        assert_eq!(h.container.session().unwrap().id, id);
    }

    #[tokio::test(start_paused = true)]
    async fn test_return_within_visibility_timeout_is_noop() {
        let h = Harness::started(config());
        h.container.handle_signal(ActivitySignal::VisibilityHidden);
        sleep_secs(30).await;
        h.container.handle_signal(ActivitySignal::VisibilityVisible);
        assert_eq!(h.snapshots(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rollover_after_idle_gap() {
        let h = Harness::started(config());
        h.emit(&h.checkout(), true);
        sleep_secs(6).await;

        let before_gap = h.event();
        h.emit(&before_gap, false);
        sleep_secs(4).await;
        h.container.handle_signal(ActivitySignal::VisibilityHidden);
        settle().await;
        assert_eq!(h.sent().len(), 2);
        let old_id = h.container.session().unwrap().id;

        sleep_secs(400).await;
        let gap = h.event();
        h.emit(&gap, false);
        h.container.handle_signal(ActivitySignal::VisibilityVisible);

        assert_eq!(h.snapshots(), 1);
        let session = h.container.session().unwrap();
        assert_ne!(session.id, old_id);
        assert_eq!(session.previous_session_id.as_deref(), Some(old_id.as_str()));

        // the recorder answers with a checkout; no initial flush for a rolled-over session
        let checkout = h.checkout();
        h.emit(&checkout, true);
        sleep_secs(10).await;
        assert_eq!(h.sent().len(), 2);

        let after = h.event();
        h.emit(&after, false);
        sleep_secs(6).await;

        let sent = h.sent();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[2].replay_id(), session.id);
        assert_eq!(sent[2].segment_id, 0);
        assert_eq!(decode(&sent[2]), vec![checkout, after]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blur_while_hidden_flushes_once() {
        let h = Harness::started(config());
        h.emit(&h.checkout(), true);
        sleep_secs(6).await;

        h.container.handle_signal(ActivitySignal::VisibilityHidden);
        settle().await;
        assert_eq!(h.sent().len(), 1);

        let last_activity = h.container.session().unwrap().last_activity;
        let buffered = h.event();
        h.emit(&buffered, false);
        h.container.handle_signal(ActivitySignal::WindowBlur);
        settle().await;

        let sent = h.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(decode(&sent[1]), vec![buffered]);
        assert_eq!(h.container.session().unwrap().last_activity, last_activity);

        sleep_secs(30).await;
        assert_eq!(h.sent().len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blur_while_visible_adds_breadcrumb() {
        let h = Harness::started(config());
        h.emit(&h.checkout(), true);
        sleep_secs(6).await;

        let first = h.event();
        let second = h.event();
        h.emit(&first, false);
        h.emit(&second, false);
        h.container.handle_signal(ActivitySignal::WindowBlur);
        settle().await;

        let sent = h.sent();
        assert_eq!(sent.len(), 2);
        let events = decode(&sent[1]);
        assert_eq!(events.len(), 3);
        assert_eq!(&events[..2], &[first, second]);
        assert_eq!(events[2].event_type, RecordingEvent::CUSTOM);
        assert_eq!(events[2].data["tag"], "breadcrumb");
        assert_eq!(events[2].data["payload"]["category"], "ui.blur");
    }

    #[tokio::test(start_paused = true)]
    async fn test_focus_adds_breadcrumb() {
        let h = Harness::started(config());
        h.emit(&h.checkout(), true);
        sleep_secs(6).await;
        assert_eq!(h.sent().len(), 1);

        h.container.handle_signal(ActivitySignal::WindowBlur);
        settle().await;
        assert_eq!(h.sent().len(), 2);

        h.container.handle_signal(ActivitySignal::WindowFocus);
        sleep_secs(6).await;

        let sent = h.sent();
        assert_eq!(sent.len(), 3);
        let events = decode(&sent[2]);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].data["payload"]["category"], "ui.focus");
        assert_eq!(h.snapshots(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_in_buffer_mode_switches_to_session() {
        let h = Harness::started(ReplayConfig {
            session_sample_rate: 0.0,
            error_sample_rate: 1.0,
            ..config()
        });
        assert_eq!(h.container.recording_mode(), Some(RecordingMode::Buffer));

        h.emit(&h.checkout(), true);
        h.emit(&h.event(), false);
        sleep_secs(60).await;
        assert!(h.sent().is_empty());

        // the send-failure diagnostic never triggers a flush
        h.container
            .handle_error_event(&ErrorEvent {
                event_id: "diag".to_string(),
                message: "Unable to send Replay - max retries exceeded".to_string(),
            })
            .await;
        assert!(h.sent().is_empty());

        h.container
            .handle_error_event(&ErrorEvent {
                event_id: "err-1".to_string(),
                message: "TypeError: x is undefined".to_string(),
            })
            .await;

        let sent = h.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].event.error_ids, vec!["err-1"]);
        assert_eq!(sent[0].event.replay_type, "buffer");
        assert_eq!(decode(&sent[0]).len(), 2);
        assert_eq!(h.container.recording_mode(), Some(RecordingMode::Session));
        assert_eq!(h.snapshots(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_pause_and_resume() {
        let h = Harness::started(config());
        h.container.pause();
        assert!(h.container.is_paused());

        h.emit(&h.event(), false);
        sleep_secs(30).await;
        assert!(h.sent().is_empty());

        h.container.resume();
        assert!(!h.container.is_paused());
        assert_eq!(h.snapshots(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_events_discarded() {
        let h = Harness::started(config());
        sleep_secs(10).await;

        let old = RecordingEvent::new(
            RecordingEvent::INCREMENTAL_SNAPSHOT,
            h.clock.now_ms() - 301_000,
            json!({}),
        );
        h.emit(&old, false);
        h.container.flush_and_wait().await;
        assert!(h.sent().is_empty());

        // seconds are normalized to milliseconds
        let in_seconds = RecordingEvent::new(RecordingEvent::INCREMENTAL_SNAPSHOT, h.clock.now_ms() / 1000, json!({}));
        h.emit(&in_seconds, false);
        h.container.flush_and_wait().await;
        let sent = h.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(decode(&sent[0])[0].timestamp_ms(), (h.clock.now_ms() / 1000) * 1000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interaction_and_navigation() {
        let h = Harness::started(config());
        let started = h.container.session().unwrap().last_activity;

        sleep_secs(20).await;
        h.container.handle_signal(ActivitySignal::UserInteraction);
        assert_eq!(h.container.session().unwrap().last_activity, started + 20_000);

        h.container.handle_transaction("trace-1");
        h.container.add_url("https://example.com/next");
        h.emit(&h.event(), false);
        h.container.flush_and_wait().await;

        let sent = h.sent();
        assert_eq!(sent[0].event.trace_ids, vec!["trace-1"]);
        assert_eq!(sent[0].event.urls, vec!["https://example.com/next"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_and_clear_session() {
        let h = Harness::started(config());
        h.emit(&h.event(), false);
        h.container.stop();
        assert!(!h.container.is_enabled());

        sleep_secs(30).await;
        assert!(h.sent().is_empty());
        assert!(fetch_session(h.store.as_ref()).is_some());

        h.container.clear_session();
        assert!(fetch_session(h.store.as_ref()).is_none());

        // can be started again
        h.container.start().unwrap();
        assert!(h.container.is_enabled());
    }

    #[tokio::test]
    async fn test_compressed_pipeline() {
        let h = Harness::started(ReplayConfig {
            use_compression: true,
            ..config()
        });
        let checkout = h.checkout();
        h.emit(&checkout, true);
        h.container.shutdown().await;

        let sent = h.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].recording.is_compressed());
        let raw = crate::buffer::compressor::Compressor
            .decompress(sent[0].recording.as_bytes())
            .unwrap();
        let events: Vec<RecordingEvent> = serde_json::from_slice(&raw).unwrap();
        assert_eq!(events, vec![checkout]);
        assert!(!h.container.is_enabled());
    }

    #[tokio::test]
    async fn test_lost_worker_falls_back_to_array() {
        let h = Harness::started(ReplayConfig {
            use_compression: true,
            ..config()
        });
        h.emit(&h.checkout(), true);

        let running = h.container.running().unwrap();
        {
            let mut state = running.state.lock();
            assert_eq!(state.buffer.kind(), BufferKind::Compressed);
            state.buffer.destroy();
        }
        let snapshots = h.snapshots();

        let event = h.event();
        h.emit(&event, false);
        assert_eq!(running.state.lock().buffer.kind(), BufferKind::Array);
        assert_eq!(h.snapshots(), snapshots + 1);

        h.container.shutdown().await;
        let sent = h.sent();
        assert_eq!(sent.len(), 1);
        assert!(!sent[0].recording.is_compressed());
        assert_eq!(decode(&sent[0]), vec![event]);
        assert_eq!(sent[0].segment_id, 0);
    }
}
