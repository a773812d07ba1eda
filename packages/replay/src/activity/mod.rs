// packages/replay/src/activity/mod.rs
//! User and visibility signals

pub mod monitor;

pub use monitor::{ActivityDecision, ActivityMonitor, ActivitySignal};
