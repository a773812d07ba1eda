// packages/replay/src/buffer/mod.rs
//! Event buffering
//!
//! Two implementations share the [`EventBuffer`] contract:
//!
//! - **array**: events kept in memory, JSON-serialized on `finish`
//! - **compressed**: events streamed into a background DEFLATE worker
//!
//! A checkout (`is_checkout = true`) replaces everything buffered so far.
//! `finish` swaps the content out synchronously and returns a future that
//! resolves to the serialized segment, so events added after `finish` returns
//! always belong to the next segment.

pub mod array;
pub mod compressed;
pub mod compressor;
pub mod event;
pub mod rpc;
pub mod worker;

pub use array::ArrayEventBuffer;
pub use compressed::CompressedEventBuffer;
pub use event::{Breadcrumb, PerformanceEntry, RecordingEvent, RecordingPayload};

use crate::observability::WORKER_FALLBACKS;
use crate::utils::config::ReplayConfig;
use crate::utils::errors::Result;
use futures::future::BoxFuture;
use tracing::{debug, warn};

/// Which implementation backs a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    Array,
    Compressed,
}

/// Ordered, resettable accumulation of recording events
pub trait EventBuffer: Send {
    fn kind(&self) -> BufferKind;

    /// Number of events in the current segment
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append an event; a checkout replaces the buffered content
    fn add_event(&mut self, event: RecordingEvent, is_checkout: bool) -> Result<()>;

    /// Swap out the buffered events and encode them
    fn finish(&mut self) -> BoxFuture<'static, Result<RecordingPayload>>;

    /// Drop buffered events without producing a segment
    fn clear(&mut self);

    /// Release resources; the buffer is unusable afterwards
    fn destroy(&mut self);
}

/// Pick the buffer implementation for `config`
///
/// The compressed buffer is used when compression is enabled and the worker
/// starts; otherwise the array buffer is returned.
pub fn create_event_buffer(config: &ReplayConfig) -> Box<dyn EventBuffer> {
    if config.use_compression {
        match CompressedEventBuffer::new(config.compression_level, config.worker_request_timeout()) {
            Ok(buffer) => return Box::new(buffer),
            Err(e) => {
                warn!("Compression worker unavailable, using array buffer: {}", e);
                metrics::counter!(WORKER_FALLBACKS).increment(1);
            }
        }
    }

    debug!("Using array event buffer");
    Box::new(ArrayEventBuffer::new())
}
