// packages/replay/src/main.rs
//! Replay capture runner
//!
//! Feeds recorder output from a JSONL file (or stdin) through the replay
//! pipeline and writes each segment envelope to the configured directory.
//! Every line is either `{"event": {...}, "isCheckout": bool}` or an activity
//! signal such as `{"signal": "window_blur"}`.

use anyhow::{Context, Result};
use sentra_replay::observability::{init_metrics, init_tracing};
use sentra_replay::utils::clock::TokioClock;
use sentra_replay::{
    ActivitySignal, DirectoryTransport, KeyValueStore, MemoryStore, RecordingEvent, Recorder, ReplayConfig,
    ReplayContainer, ReplayDeps, SqliteStore, TracingCapture,
};
use serde::Deserialize;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum InputLine {
    #[serde(rename_all = "camelCase")]
    Recording {
        event: RecordingEvent,
        #[serde(default)]
        is_checkout: bool,
    },
    Signal {
        signal: ActivitySignal,
    },
}

/// Recorder stand-in: replayed input cannot produce new snapshots
struct LoggingRecorder;

impl Recorder for LoggingRecorder {
    fn take_full_snapshot(&self, is_checkout: bool) {
        info!("Full snapshot requested (checkout: {})", is_checkout);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = ReplayConfig::load()?;

    // Initialize observability (tracing, metrics)
    init_tracing(&config.observability)?;
    let metrics = init_metrics()?;

    info!("Starting replay-capture v{}", sentra_replay::VERSION);

    let store: Arc<dyn KeyValueStore> = match &config.session_store_path {
        Some(path) => Arc::new(SqliteStore::open(path)?),
        None => Arc::new(MemoryStore::new()),
    };
    let transport = Arc::new(DirectoryTransport::new(&config.output_dir).await?);

    let container = ReplayContainer::new(
        config,
        ReplayDeps {
            store,
            transport,
            capture: Arc::new(TracingCapture),
            recorder: Arc::new(LoggingRecorder),
            clock: Arc::new(TokioClock::new()),
        },
    );
    container.start()?;

    let input: Box<dyn AsyncBufRead + Unpin + Send> = match std::env::args().nth(1) {
        Some(path) => {
            let file = tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("Failed to open {}", path))?;
            Box::new(BufReader::new(file))
        }
        None => Box::new(BufReader::new(tokio::io::stdin())),
    };

    // Graceful shutdown handler
    let shutdown_signal = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for CTRL+C: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received shutdown signal, flushing...");
    };

    tokio::select! {
        result = feed(&container, input) => result?,
        _ = shutdown_signal => {}
    }

    container.shutdown().await;
    info!("Replay capture stopped");

    println!("{}", metrics.render());
    Ok(())
}

async fn feed(container: &ReplayContainer, input: Box<dyn AsyncBufRead + Unpin + Send>) -> Result<()> {
    let mut lines = input.lines();
    let mut line_no = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        if line.trim().is_empty() {
            continue;
        }

        match serde_json::from_str::<InputLine>(&line) {
            Ok(InputLine::Recording { event, is_checkout }) => container.handle_recording_emit(event, is_checkout),
            Ok(InputLine::Signal { signal }) => container.handle_signal(signal),
            Err(e) => warn!("Skipping line {}: {}", line_no, e),
        }
    }

    info!("Processed {} input lines", line_no);
    Ok(())
}
