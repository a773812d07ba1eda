// packages/replay/src/scheduler/flush.rs
//! Coalescing of flush requests
//!
//! `Idle → Running` starts a flush. Requests arriving while it runs collapse
//! into `RunningWithPending`, which triggers exactly one follow-up flush.

use crate::observability::FLUSHES_COALESCED;
use crate::scheduler::FlushRunner;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushState {
    Idle,
    Running,
    RunningWithPending,
}

pub struct FlushCoalescer {
    state: Arc<watch::Sender<FlushState>>,
    runner: Arc<dyn FlushRunner>,
    runtime: Handle,
}

impl FlushCoalescer {
    pub fn new(runner: Arc<dyn FlushRunner>, runtime: Handle) -> Self {
        let (state, _) = watch::channel(FlushState::Idle);
        Self {
            state: Arc::new(state),
            runner,
            runtime,
        }
    }

    pub fn state(&self) -> FlushState {
        *self.state.borrow()
    }

    /// Request a flush
    pub fn flush(&self) {
        let mut start = false;
        self.state.send_modify(|state| {
            *state = match *state {
                FlushState::Idle => {
                    start = true;
                    FlushState::Running
                }
                FlushState::Running | FlushState::RunningWithPending => FlushState::RunningWithPending,
            }
        });

        if !start {
            debug!("Flush already running, queued a follow-up");
            metrics::counter!(FLUSHES_COALESCED).increment(1);
            return;
        }

        let state = Arc::clone(&self.state);
        let runner = Arc::clone(&self.runner);
        self.runtime.spawn(async move {
            loop {
                runner.run_flush().await;

                let mut again = false;
                state.send_modify(|state| {
                    *state = match *state {
                        FlushState::RunningWithPending => {
                            again = true;
                            FlushState::Running
                        }
                        _ => FlushState::Idle,
                    }
                });
                if !again {
                    break;
                }
            }
        });
    }

    /// Wait until no flush is running or pending
    pub async fn settled(&self) {
        let mut rx = self.state.subscribe();
        // the sender lives in `self`, so the channel cannot close here
        let _ = rx.wait_for(|state| *state == FlushState::Idle).await;
    }
}
