// packages/replay/src/delivery/retry.rs
//! Retry state machine for segment delivery
//!
//! `Idle → Sending → Success`, or `Sending → Retrying(n) → Sending` until the
//! backoff schedule runs out, then `GivenUp`. The machine is pure; the
//! delivery loop performs the sends and sleeps it asks for.

use std::time::Duration;

/// Waits before each retry; the schedule length is the retry count
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    backoff: Vec<Duration>,
}

impl RetryPolicy {
    pub fn new(backoff: Vec<Duration>) -> Self {
        Self { backoff }
    }

    pub fn backoff(&self, retry: u32) -> Option<Duration> {
        retry
            .checked_sub(1)
            .and_then(|i| self.backoff.get(i as usize))
            .copied()
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(vec![
            Duration::from_secs(5),
            Duration::from_secs(10),
            Duration::from_secs(30),
        ])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryState {
    Idle,
    Sending { attempt: u32 },
    /// Waiting before retry number `n` (1-based)
    Retrying(u32),
    Success { attempts: u32 },
    GivenUp { attempts: u32 },
}

/// What the delivery loop should do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryStep {
    Send,
    Wait(Duration),
    Done,
}

#[derive(Debug, Clone)]
pub struct RetryMachine {
    policy: RetryPolicy,
    state: RetryState,
}

impl RetryMachine {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            state: RetryState::Idle,
        }
    }

    pub fn state(&self) -> RetryState {
        self.state
    }

    /// Advance past `Idle` or `Retrying`
    pub fn next_step(&mut self) -> RetryStep {
        match self.state {
            RetryState::Idle => {
                self.state = RetryState::Sending { attempt: 1 };
                RetryStep::Send
            }
            RetryState::Retrying(n) => {
                self.state = RetryState::Sending { attempt: n + 1 };
                RetryStep::Send
            }
            RetryState::Sending { .. } => RetryStep::Send,
            RetryState::Success { .. } | RetryState::GivenUp { .. } => RetryStep::Done,
        }
    }

    /// Record the outcome of the current send
    pub fn on_result(&mut self, ok: bool) -> RetryStep {
        let attempt = match self.state {
            RetryState::Sending { attempt } => attempt,
            _ => return RetryStep::Done,
        };

        if ok {
            self.state = RetryState::Success { attempts: attempt };
            return RetryStep::Done;
        }

        match self.policy.backoff(attempt) {
            Some(wait) => {
                self.state = RetryState::Retrying(attempt);
                RetryStep::Wait(wait)
            }
            None => {
                self.state = RetryState::GivenUp { attempts: attempt };
                RetryStep::Done
            }
        }
    }
}
