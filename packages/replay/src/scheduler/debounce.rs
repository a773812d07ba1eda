// packages/replay/src/scheduler/debounce.rs
//! Debounced flush scheduling
//!
//! A background task keeps two deadlines: the quiet deadline moves forward
//! with every event, the max deadline is fixed by the first event after the
//! last flush. Whichever passes first requests a flush from the coalescer.

use crate::scheduler::flush::{FlushCoalescer, FlushState};
use crate::scheduler::FlushRunner;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

#[derive(Debug)]
enum Command {
    /// An event was buffered
    Debounce,
    /// Flush after a fixed delay (initial checkout)
    FlushIn(Duration),
    /// Drop pending timers
    Cancel,
}

/// Turns buffered events and immediate triggers into coalesced flushes
pub struct FlushScheduler {
    coalescer: Arc<FlushCoalescer>,
    commands: mpsc::UnboundedSender<Command>,
    shutdown: CancellationToken,
    timer: JoinHandle<()>,
}

impl FlushScheduler {
    pub fn start(runner: Arc<dyn FlushRunner>, min_delay: Duration, max_delay: Duration, runtime: Handle) -> Self {
        let coalescer = Arc::new(FlushCoalescer::new(runner, runtime.clone()));
        let (commands, rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        let timer = runtime.spawn(run_timer(
            rx,
            Arc::clone(&coalescer),
            shutdown.clone(),
            min_delay,
            max_delay,
        ));

        debug!("Flush scheduler started (min {:?}, max {:?})", min_delay, max_delay);

        Self {
            coalescer,
            commands,
            shutdown,
            timer,
        }
    }

    /// An event was buffered; flush after a quiet period
    pub fn debounce(&self) {
        let _ = self.commands.send(Command::Debounce);
    }

    /// Flush once `delay` has passed
    pub fn flush_in(&self, delay: Duration) {
        let _ = self.commands.send(Command::FlushIn(delay));
    }

    /// Drop pending timers and flush right away
    pub fn flush_now(&self) {
        self.cancel();
        self.coalescer.flush();
    }

    /// Drop pending timers without flushing
    pub fn cancel(&self) {
        let _ = self.commands.send(Command::Cancel);
    }

    pub fn state(&self) -> FlushState {
        self.coalescer.state()
    }

    /// Wait until no flush is running or pending
    pub async fn settled(&self) {
        self.coalescer.settled().await;
    }

    /// Stop the timers. A flush already running is left to finish.
    pub fn stop(&self) {
        self.shutdown.cancel();
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.is_cancelled() || self.timer.is_finished()
    }
}

impl Drop for FlushScheduler {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn run_timer(
    mut commands: mpsc::UnboundedReceiver<Command>,
    coalescer: Arc<FlushCoalescer>,
    shutdown: CancellationToken,
    min_delay: Duration,
    max_delay: Duration,
) {
    let mut quiet_deadline: Option<Instant> = None;
    let mut max_deadline: Option<Instant> = None;

    loop {
        let next = match (quiet_deadline, max_deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };

        tokio::select! {
            _ = shutdown.cancelled() => break,

            command = commands.recv() => {
                let now = Instant::now();
                match command {
                    None => break,
                    Some(Command::Debounce) => {
                        quiet_deadline = Some(now + min_delay);
                        max_deadline.get_or_insert(now + max_delay);
                    }
                    Some(Command::FlushIn(delay)) => {
                        quiet_deadline = Some(now + delay);
                        max_deadline.get_or_insert(now + max_delay);
                    }
                    Some(Command::Cancel) => {
                        trace!("Flush timers cancelled");
                        quiet_deadline = None;
                        max_deadline = None;
                    }
                }
            }

            _ = tokio::time::sleep_until(next.unwrap_or_else(Instant::now)), if next.is_some() => {
                quiet_deadline = None;
                max_deadline = None;
                coalescer.flush();
            }
        }
    }

    debug!("Flush scheduler stopped");
}
