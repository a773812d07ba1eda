// packages/replay/src/lib.rs
//! Sentra Replay Capture Library
//!
//! Accumulates a user's session recording and delivers it to a backend in
//! segments, under tight bandwidth and CPU budgets, without ever failing the
//! host application.
//!
//! # Architecture
//!
//! Data flows one way: recorder events → buffer → scheduler → delivery →
//! transport. The pipeline is split into these modules:
//!
//! - **session**: session identity, expiry, sampling and persistence
//! - **buffer**: array and worker-compressed event buffers
//! - **scheduler**: debounced, coalesced flush scheduling
//! - **delivery**: envelope building and retrying delivery
//! - **activity**: classification of user and visibility signals
//! - **replay**: the `ReplayContainer` tying everything together
//! - **observability**: tracing and metrics setup
//! - **utils**: errors, configuration, clock and ids

// Public module exports
pub mod activity;
pub mod buffer;
pub mod delivery;
pub mod observability;
pub mod replay;
pub mod scheduler;
pub mod session;
pub mod utils;

// Re-export commonly used types
pub use activity::ActivitySignal;
pub use buffer::{Breadcrumb, PerformanceEntry, RecordingEvent};
pub use delivery::{DirectoryTransport, ExceptionCapture, ReplayEnvelope, TracingCapture, Transport};
pub use replay::{ErrorEvent, Recorder, ReplayContainer, ReplayDeps};
pub use session::{KeyValueStore, MemoryStore, SqliteStore};
pub use utils::config::ReplayConfig;
pub use utils::errors::{ReplayError, Result};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
