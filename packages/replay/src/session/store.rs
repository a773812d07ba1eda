// packages/replay/src/session/store.rs
//! Session persistence
//!
//! The session lives under a single key in a key/value store. Reads treat a
//! missing, unreadable or unparsable value as "no session"; writes are best
//! effort and never fail the caller.

use crate::session::Session;
use crate::utils::errors::{ReplayError, Result};
use dashmap::DashMap;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use tracing::{debug, info, warn};

/// Storage key holding the serialized session
pub const REPLAY_SESSION_KEY: &str = "sentryReplaySession";

/// Minimal string key/value store
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
    fn remove(&self, key: &str) -> Result<()>;
}

/// Process-local store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).map(|v| v.value().clone()))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.remove(key);
        Ok(())
    }
}

/// SQLite-backed store surviving process restarts
pub struct SqliteStore {
    db: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| ReplayError::StorageUnavailable(format!("Failed to create directory: {}", e)))?;
        }

        let conn = Connection::open(path)
            .map_err(|e| ReplayError::StorageUnavailable(format!("Failed to open database: {}", e)))?;
        let store = Self::with_connection(conn)?;

        info!("Session store opened at {:?}", path);
        Ok(store)
    }

    /// Store that lives only as long as the process
    pub fn in_memory() -> Result<Self> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;

        Ok(Self { db: Mutex::new(conn) })
    }
}

impl KeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let db = self.db.lock();
        let value = db
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let db = self.db.lock();
        db.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, chrono::Utc::now().timestamp_millis()],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let db = self.db.lock();
        db.execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

/// Read the stored session; any failure reads as "none"
pub fn fetch_session(store: &dyn KeyValueStore) -> Option<Session> {
    let raw = match store.get(REPLAY_SESSION_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            warn!("Unable to read stored session: {}", e);
            return None;
        }
    };

    match serde_json::from_str::<Session>(&raw) {
        Ok(session) => Some(session),
        Err(e) => {
            let err = ReplayError::SessionDataCorrupt(e.to_string());
            debug!("Ignoring stored session: {}", err);
            None
        }
    }
}

/// Persist the session, swallowing failures
pub fn save_session(store: &dyn KeyValueStore, session: &Session) {
    let result = serde_json::to_string(session)
        .map_err(ReplayError::from)
        .and_then(|raw| store.set(REPLAY_SESSION_KEY, &raw));

    if let Err(e) = result {
        warn!("Unable to persist session {}: {}", session.id, e);
    }
}

/// Delete the stored session, swallowing failures
pub fn clear_session(store: &dyn KeyValueStore) {
    if let Err(e) = store.remove(REPLAY_SESSION_KEY) {
        warn!("Unable to clear stored session: {}", e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SampleDecision;

    fn session() -> Session {
        let mut session = Session::new(SampleDecision::Session, 1_700_000_000_000, None);
        session.last_activity += 1_234;
        session.segment_id = 7;
        session
    }

    /// Store whose every operation fails
    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _: &str) -> Result<Option<String>> {
            Err(ReplayError::StorageUnavailable("quota exceeded".to_string()))
        }
        fn set(&self, _: &str, _: &str) -> Result<()> {
            Err(ReplayError::StorageUnavailable("quota exceeded".to_string()))
        }
        fn remove(&self, _: &str) -> Result<()> {
            Err(ReplayError::StorageUnavailable("quota exceeded".to_string()))
        }
    }

    #[test]
    fn test_memory_round_trip() {
        let store = MemoryStore::new();
        let original = session();
        save_session(&store, &original);

        let fetched = fetch_session(&store).unwrap();
        assert_eq!(fetched.id, original.id);
        assert_eq!(fetched.started, original.started);
        assert_eq!(fetched.last_activity, original.last_activity);
        assert_eq!(fetched.segment_id, 7);

        clear_session(&store);
        assert!(fetch_session(&store).is_none());
    }

    #[test]
    fn test_sqlite_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("sessions.db");
        let original = session();

        {
            let store = SqliteStore::open(&path).unwrap();
            save_session(&store, &original);
        }

        let reopened = SqliteStore::open(&path).unwrap();
        assert_eq!(fetch_session(&reopened), Some(original.clone()));

        let mut updated = original;
        updated.segment_id = 8;
        save_session(&reopened, &updated);
        assert_eq!(fetch_session(&reopened).unwrap().segment_id, 8);
    }

    #[test]
    fn test_unparsable_is_absent() {
        let store = SqliteStore::in_memory().unwrap();
        store.set(REPLAY_SESSION_KEY, "{not json").unwrap();
        assert!(fetch_session(&store).is_none());

        store.set(REPLAY_SESSION_KEY, r#"{"id":"x"}"#).unwrap();
        assert!(fetch_session(&store).is_none());
    }

    #[test]
    fn test_storage_failures_swallowed() {
        let store = BrokenStore;
        save_session(&store, &session());
        clear_session(&store);
        assert!(fetch_session(&store).is_none());
    }
}
