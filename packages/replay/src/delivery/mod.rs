// packages/replay/src/delivery/mod.rs
//! Segment delivery pipeline
//!
//! - **context**: error/trace ids and URLs attached to the next segment
//! - **envelope**: `replay_event` + `replay_recording` wire format
//! - **transport**: host-supplied send and exception-capture seams
//! - **retry**: fixed-backoff retry state machine
//! - **controller**: `run_flush`, tying the pieces together

pub mod context;
pub mod controller;
pub mod envelope;
pub mod retry;
pub mod transport;

pub use context::ReplayEventContext;
pub use controller::{DeliveryController, FlushOutcome};
pub use envelope::{ReplayEnvelope, ReplayEvent};
pub use retry::{RetryMachine, RetryPolicy, RetryState};
pub use transport::{DirectoryTransport, ExceptionCapture, TracingCapture, Transport};
