// packages/replay/src/utils/clock.rs
//! Wall-clock source for session timestamps
//!
//! Session expiry compares epoch milliseconds while the scheduler and the
//! retry loop sleep on tokio timers. [`TokioClock`] derives epoch time from
//! tokio's monotonic clock so both stay consistent, including under a paused
//! test runtime where `tokio::time::advance` moves them together.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::Instant;

/// Source of "now" in epoch milliseconds
pub trait Clock: Send + Sync + 'static {
    fn now_ms(&self) -> u64;
}

/// Epoch clock anchored at construction and advanced by tokio time
#[derive(Debug, Clone)]
pub struct TokioClock {
    epoch_ms: u64,
    origin: Instant,
}

impl TokioClock {
    pub fn new() -> Self {
        Self::anchored_at(chrono::Utc::now().timestamp_millis().max(0) as u64)
    }

    /// Anchor the clock at a fixed epoch time (useful for reproducible runs)
    pub fn anchored_at(epoch_ms: u64) -> Self {
        Self {
            epoch_ms,
            origin: Instant::now(),
        }
    }
}

impl Default for TokioClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TokioClock {
    fn now_ms(&self) -> u64 {
        self.epoch_ms + self.origin.elapsed().as_millis() as u64
    }
}

/// Manually driven clock
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new(now_ms: u64) -> Self {
        Self {
            now: AtomicU64::new(now_ms),
        }
    }

    pub fn set(&self, now_ms: u64) {
        self.now.store(now_ms, Ordering::SeqCst);
    }

    pub fn advance(&self, by: Duration) {
        self.now.fetch_add(by.as_millis() as u64, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock() {
        let clock = ManualClock::new(1_000);
        clock.advance(Duration::from_secs(5));
        assert_eq!(clock.now_ms(), 6_000);
        clock.set(42);
        assert_eq!(clock.now_ms(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tokio_clock_follows_paused_time() {
        let clock = TokioClock::anchored_at(1_700_000_000_000);
        assert_eq!(clock.now_ms(), 1_700_000_000_000);

        tokio::time::advance(Duration::from_secs(300)).await;
        assert_eq!(clock.now_ms(), 1_700_000_300_000);
    }
}
