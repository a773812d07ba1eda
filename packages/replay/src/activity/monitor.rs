// packages/replay/src/activity/monitor.rs
//! Classification of activity signals
//!
//! The monitor only decides; the container applies the decision to the
//! session, the buffer and the scheduler.

use serde::{Deserialize, Serialize};
use tracing::trace;

/// Signals reported by the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivitySignal {
    VisibilityHidden,
    VisibilityVisible,
    WindowBlur,
    WindowFocus,
    UserInteraction,
}

/// What the container should do about a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivityDecision {
    /// Going to the background: flush now, optionally recording a breadcrumb
    Background { breadcrumb: Option<&'static str> },

    /// Back within the visibility timeout
    Continue { breadcrumb: Option<&'static str> },

    /// Back after the visibility timeout: take a new checkout, rolling the
    /// session over first when it expired
    NewCheckout {
        rollover: bool,
        breadcrumb: Option<&'static str>,
    },

    /// User activity on a live session
    ExtendIdle,

    /// User activity after the session expired
    Rollover,
}

impl ActivityDecision {
    /// Breadcrumb category to record when the session is still live
    pub fn breadcrumb(&self) -> Option<&'static str> {
        match self {
            ActivityDecision::Background { breadcrumb }
            | ActivityDecision::Continue { breadcrumb }
            | ActivityDecision::NewCheckout { breadcrumb, .. } => *breadcrumb,
            ActivityDecision::ExtendIdle | ActivityDecision::Rollover => None,
        }
    }
}

/// Tracks whether the page is hidden and since when it has been away
#[derive(Debug, Clone)]
pub struct ActivityMonitor {
    visibility_timeout_ms: u64,
    hidden: bool,
    away_since: Option<u64>,
}

impl ActivityMonitor {
    pub fn new(visibility_timeout_ms: u64) -> Self {
        Self {
            visibility_timeout_ms,
            hidden: false,
            away_since: None,
        }
    }

    pub fn is_hidden(&self) -> bool {
        self.hidden
    }

    /// Classify `signal` observed at `now_ms`
    pub fn classify(&mut self, signal: ActivitySignal, now_ms: u64, session_expired: bool) -> ActivityDecision {
        let decision = match signal {
            ActivitySignal::VisibilityHidden => {
                self.hidden = true;
                self.away_since.get_or_insert(now_ms);
                ActivityDecision::Background { breadcrumb: None }
            }
            ActivitySignal::WindowBlur if self.hidden => ActivityDecision::Background { breadcrumb: None },
            ActivitySignal::WindowBlur => {
                self.away_since.get_or_insert(now_ms);
                ActivityDecision::Background {
                    breadcrumb: Some("ui.blur"),
                }
            }
            ActivitySignal::VisibilityVisible | ActivitySignal::WindowFocus => {
                self.hidden = false;
                let breadcrumb = (signal == ActivitySignal::WindowFocus).then_some("ui.focus");
                match self.away_since.take() {
                    Some(since) if now_ms.saturating_sub(since) > self.visibility_timeout_ms => {
                        ActivityDecision::NewCheckout {
                            rollover: session_expired,
                            breadcrumb,
                        }
                    }
                    _ => ActivityDecision::Continue { breadcrumb },
                }
            }
            ActivitySignal::UserInteraction if session_expired => ActivityDecision::Rollover,
            ActivitySignal::UserInteraction => ActivityDecision::ExtendIdle,
        };

        trace!("Activity {:?} -> {:?}", signal, decision);
        decision
    }
}
