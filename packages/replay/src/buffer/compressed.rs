// packages/replay/src/buffer/compressed.rs
//! Event buffer that streams events into the compression worker
//!
//! Events are serialized here and compressed on the worker thread as they
//! arrive, so `finish` only has to close the stream.

use crate::buffer::compressor::CompressionLevel;
use crate::buffer::event::{RecordingEvent, RecordingPayload};
use crate::buffer::worker::{CompressionWorker, WorkerMethod};
use crate::buffer::{BufferKind, EventBuffer};
use crate::utils::errors::{ReplayError, Result};
use futures::future::{self, BoxFuture};
use futures::FutureExt;
use std::time::Duration;
use tracing::debug;

pub struct CompressedEventBuffer {
    worker: Option<CompressionWorker>,
    count: usize,
}

impl CompressedEventBuffer {
    /// Start a worker and open the first stream
    pub fn new(level: CompressionLevel, request_timeout: Option<Duration>) -> Result<Self> {
        let worker = CompressionWorker::spawn(level, request_timeout)?;
        Ok(Self {
            worker: Some(worker),
            count: 0,
        })
    }

    fn worker(&self) -> Result<&CompressionWorker> {
        self.worker
            .as_ref()
            .ok_or_else(|| ReplayError::WorkerUnavailable("buffer destroyed".to_string()))
    }
}

impl EventBuffer for CompressedEventBuffer {
    fn kind(&self) -> BufferKind {
        BufferKind::Compressed
    }

    fn len(&self) -> usize {
        self.count
    }

    fn add_event(&mut self, event: RecordingEvent, is_checkout: bool) -> Result<()> {
        let record = serde_json::to_string(&event)?;
        let client = self.worker()?.client();

        if is_checkout {
            client.post(WorkerMethod::Init, None)?;
        }
        client.post(WorkerMethod::AddEvent, Some(record))?;

        self.count = if is_checkout { 1 } else { self.count + 1 };
        Ok(())
    }

    fn finish(&mut self) -> BoxFuture<'static, Result<RecordingPayload>> {
        let events = self.count;
        self.count = 0;

        let call = match self.worker().and_then(|w| w.client().request(WorkerMethod::Finish, None)) {
            Ok(call) => call,
            Err(e) => return future::ready(Err(e)).boxed(),
        };

        async move {
            let bytes = call.response().await?;
            debug!("Worker finished segment of {} events ({} bytes)", events, bytes.len());
            Ok::<_, ReplayError>(RecordingPayload::Compressed(bytes))
        }
        .boxed()
    }

    fn clear(&mut self) {
        if let Some(worker) = &self.worker {
            // a failed post surfaces on the next add
            let _ = worker.client().post(WorkerMethod::Init, None);
        }
        self.count = 0;
    }

    fn destroy(&mut self) {
        self.worker = None;
        self.count = 0;
    }
}
