// packages/replay/src/session/manager.rs
//! Owner of the live session

use crate::session::store::{clear_session, fetch_session, save_session, KeyValueStore};
use crate::session::{SampleDecision, Session, SessionExpiry};
use crate::utils::clock::Clock;
use crate::utils::config::ReplayConfig;
use std::sync::Arc;
use tracing::{debug, info};

/// How sessions are created, expired and persisted
#[derive(Debug, Clone, Copy)]
pub struct SessionOptions {
    pub expiry: SessionExpiry,
    pub sticky: bool,
    pub session_sample_rate: f64,
    pub error_sample_rate: f64,
}

impl SessionOptions {
    pub fn from_config(config: &ReplayConfig) -> Self {
        Self {
            expiry: SessionExpiry {
                idle_timeout_ms: config.session_idle_timeout_ms,
                max_age_ms: config.max_session_life_ms,
            },
            sticky: config.sticky_session,
            session_sample_rate: config.session_sample_rate,
            error_sample_rate: config.error_sample_rate,
        }
    }
}

/// Holds the current session and writes it through to the store when sticky
pub struct SessionManager {
    store: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    options: SessionOptions,
    session: Session,
}

impl SessionManager {
    /// Resume a valid stored session (sticky only) or create a new one.
    ///
    /// An expired stored session becomes the new session's predecessor.
    pub fn load(store: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>, options: SessionOptions) -> Self {
        let now = clock.now_ms();
        let stored = if options.sticky {
            fetch_session(store.as_ref())
        } else {
            None
        };

        let session = match stored {
            Some(session) if !session.is_expired(now, options.expiry) => {
                debug!("Resuming session {} at segment {}", session.id, session.segment_id);
                session
            }
            Some(expired) => {
                debug!("Stored session {} expired", expired.id);
                Self::create(&options, now, Some(expired.id))
            }
            None => Self::create(&options, now, None),
        };

        let manager = Self {
            store,
            clock,
            options,
            session,
        };
        if manager.options.sticky {
            manager.persist();
        }
        manager
    }

    fn create(options: &SessionOptions, now: u64, previous_session_id: Option<String>) -> Session {
        let sampled = SampleDecision::sample(options.session_sample_rate, options.error_sample_rate);
        let session = Session::new(sampled, now, previous_session_id);
        info!("Created session {} (sampled: {:?})", session.id, session.sampled);
        session
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }

    pub fn is_expired(&self) -> bool {
        self.session.is_expired(self.clock.now_ms(), self.options.expiry)
    }

    /// Record user activity
    pub fn touch(&mut self) {
        self.session.last_activity = self.clock.now_ms();
        if self.options.sticky {
            self.persist();
        }
    }

    /// Write the session to the store (best effort)
    pub fn persist(&self) {
        save_session(self.store.as_ref(), &self.session);
    }

    /// Delete the stored session (best effort); the in-memory session is kept
    pub fn clear(&self) {
        clear_session(self.store.as_ref());
    }

    /// Replace the session with a fresh one that remembers its predecessor
    pub fn rollover(&mut self) -> &Session {
        let now = self.clock.now_ms();
        let previous = self.session.id.clone();
        self.session = Self::create(&self.options, now, Some(previous));
        if self.options.sticky {
            self.persist();
        }
        &self.session
    }

    /// Claim the id for the segment being sent and advance the counter
    pub fn next_segment_id(&mut self) -> u32 {
        let segment_id = self.session.segment_id;
        self.session.segment_id += 1;
        if self.options.sticky {
            self.persist();
        }
        segment_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::store::MemoryStore;
    use crate::utils::clock::ManualClock;
    use std::time::Duration;

    const START: u64 = 1_700_000_000_000;

    fn options(sticky: bool) -> SessionOptions {
        SessionOptions {
            expiry: SessionExpiry {
                idle_timeout_ms: 1_000,
                max_age_ms: 60_000,
            },
            sticky,
            session_sample_rate: 1.0,
            error_sample_rate: 0.0,
        }
    }

    fn setup() -> (Arc<MemoryStore>, Arc<ManualClock>) {
        (Arc::new(MemoryStore::new()), Arc::new(ManualClock::new(START)))
    }

    #[test]
    fn test_sticky_resume() {
        let (store, clock) = setup();
        let first = SessionManager::load(store.clone(), clock.clone(), options(true));
        let id = first.session().id.clone();

        clock.advance(Duration::from_millis(500));
        let second = SessionManager::load(store, clock, options(true));
        assert_eq!(second.session().id, id);
    }

    #[test]
    fn test_expired_store_gets_successor() {
        let (store, clock) = setup();
        let first = SessionManager::load(store.clone(), clock.clone(), options(true));
        let old_id = first.session().id.clone();

        clock.advance(Duration::from_millis(2_000));
        let second = SessionManager::load(store.clone(), clock, options(true));
        assert_ne!(second.session().id, old_id);
        assert_eq!(second.session().previous_session_id.as_deref(), Some(old_id.as_str()));
        assert_eq!(second.session().segment_id, 0);
        assert_eq!(fetch_session(store.as_ref()).unwrap().id, second.session().id);
    }

    #[test]
    fn test_non_sticky_ignores_store() {
        let (store, clock) = setup();
        let sticky = SessionManager::load(store.clone(), clock.clone(), options(true));
        let fresh = SessionManager::load(store.clone(), clock, options(false));

        assert_ne!(fresh.session().id, sticky.session().id);
        // the stored session is left alone
        assert_eq!(fetch_session(store.as_ref()).unwrap().id, sticky.session().id);
    }

    #[test]
    fn test_touch_and_segments_persist() {
        let (store, clock) = setup();
        let mut manager = SessionManager::load(store.clone(), clock.clone(), options(true));

        clock.advance(Duration::from_millis(800));
        manager.touch();
        assert_eq!(manager.next_segment_id(), 0);
        assert_eq!(manager.next_segment_id(), 1);

        let stored = fetch_session(store.as_ref()).unwrap();
        assert_eq!(stored.last_activity, START + 800);
        assert_eq!(stored.segment_id, 2);
    }

    #[test]
    fn test_rollover_and_clear() {
        let (store, clock) = setup();
        let mut manager = SessionManager::load(store.clone(), clock.clone(), options(true));
        let old_id = manager.session().id.clone();

        clock.advance(Duration::from_millis(5_000));
        assert!(manager.is_expired());
        let new_id = manager.rollover().id.clone();

        assert_ne!(new_id, old_id);
        assert!(!manager.is_expired());
        assert_eq!(manager.session().previous_session_id.as_deref(), Some(old_id.as_str()));

        manager.clear();
        assert!(fetch_session(store.as_ref()).is_none());
    }
}
