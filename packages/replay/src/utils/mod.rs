// packages/replay/src/utils/mod.rs
//! Common utilities shared by every pipeline stage
//!
//! - **errors**: crate error type and `Result` alias
//! - **config**: layered configuration (file + environment)
//! - **clock**: wall-clock source driven by tokio time
//! - **ids**: replay/event identifier generation

pub mod clock;
pub mod config;
pub mod errors;
pub mod ids;

pub use clock::{Clock, ManualClock, TokioClock};
pub use config::ReplayConfig;
pub use errors::{ReplayError, Result};
