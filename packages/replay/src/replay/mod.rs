// packages/replay/src/replay/mod.rs
//! Replay container and its shared state

pub mod container;
pub mod state;

pub use container::{ErrorEvent, Recorder, ReplayContainer, ReplayDeps};
pub use state::{RecordingMode, ReplayState};
