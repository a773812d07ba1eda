// packages/replay/src/scheduler/mod.rs
//! Flush scheduling
//!
//! - **flush**: coalesces flush requests so at most one delivery runs
//! - **debounce**: timers that turn a stream of events into flush requests

pub mod debounce;
pub mod flush;

pub use debounce::FlushScheduler;
pub use flush::{FlushCoalescer, FlushState};

use async_trait::async_trait;

/// Work performed by a single flush
#[async_trait]
pub trait FlushRunner: Send + Sync + 'static {
    async fn run_flush(&self);
}
