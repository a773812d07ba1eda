// packages/replay/src/utils/ids.rs
//! Identifier generation
//!
//! Replay and event ids are 32 lowercase hex characters, the format the
//! ingestion backend expects for `replay_id`/`event_id`.

use ulid::Ulid;

/// Generate a new 32-character hex identifier
pub fn new_replay_id() -> String {
    format!("{:032x}", u128::from(Ulid::new()))
}
