// packages/replay/src/observability/mod.rs
//! Logging and metrics setup
//!
//! Metric names used by the pipeline are defined here so every stage reports
//! under the same keys.

use crate::utils::config::ObservabilityConfig;
use crate::utils::errors::{ReplayError, Result};
use metrics::{describe_counter, describe_histogram, Unit};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

pub const SEGMENTS_SENT: &str = "replay_segments_sent_total";
pub const SEGMENTS_DROPPED: &str = "replay_segments_dropped_total";
pub const SEND_RETRIES: &str = "replay_send_retries_total";
pub const FLUSHES_COALESCED: &str = "replay_flushes_coalesced_total";
pub const EVENTS_DISCARDED: &str = "replay_events_discarded_total";
pub const WORKER_FALLBACKS: &str = "replay_worker_fallbacks_total";
pub const SEGMENT_BYTES: &str = "replay_segment_bytes";

/// Install the global tracing subscriber
///
/// `RUST_LOG` overrides the configured level.
pub fn init_tracing(config: &ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| ReplayError::ConfigError(format!("Invalid log level: {}", e)))?;

    let registry = tracing_subscriber::registry().with(filter);
    let installed = if config.json_logs {
        registry.with(fmt::layer().json().with_target(true)).try_init()
    } else {
        registry.with(fmt::layer().with_target(false)).try_init()
    };

    installed.map_err(|e| ReplayError::ConfigError(format!("Failed to install subscriber: {}", e)))
}

/// Install the Prometheus recorder and describe pipeline metrics
pub fn init_metrics() -> Result<PrometheusHandle> {
    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| ReplayError::ConfigError(format!("Failed to install metrics recorder: {}", e)))?;

    describe_counter!(SEGMENTS_SENT, "Segments delivered to the transport");
    describe_counter!(SEGMENTS_DROPPED, "Segments given up after exhausting retries");
    describe_counter!(SEND_RETRIES, "Send attempts retried after a transport failure");
    describe_counter!(FLUSHES_COALESCED, "Flush requests folded into a running flush");
    describe_counter!(EVENTS_DISCARDED, "Recording events dropped as stale");
    describe_counter!(WORKER_FALLBACKS, "Buffers that fell back from the compression worker");
    describe_histogram!(SEGMENT_BYTES, Unit::Bytes, "Encoded recording payload size");

    Ok(handle)
}

