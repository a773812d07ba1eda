// packages/replay/src/buffer/array.rs
//! In-memory event buffer serialized on `finish`

use crate::buffer::event::{RecordingEvent, RecordingPayload};
use crate::buffer::{BufferKind, EventBuffer};
use crate::utils::errors::{ReplayError, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::mem;

/// Event buffer backed by a `Vec`
#[derive(Debug, Default)]
pub struct ArrayEventBuffer {
    events: Vec<RecordingEvent>,
}

impl ArrayEventBuffer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventBuffer for ArrayEventBuffer {
    fn kind(&self) -> BufferKind {
        BufferKind::Array
    }

    fn len(&self) -> usize {
        self.events.len()
    }

    fn add_event(&mut self, event: RecordingEvent, is_checkout: bool) -> Result<()> {
        if is_checkout {
            self.events.clear();
        }
        self.events.push(event);
        Ok(())
    }

    fn finish(&mut self) -> BoxFuture<'static, Result<RecordingPayload>> {
        let events = mem::take(&mut self.events);
        async move {
            let text = serde_json::to_string(&events)?;
            Ok::<_, ReplayError>(RecordingPayload::Text(text))
        }
        .boxed()
    }

    fn clear(&mut self) {
        self.events.clear();
    }

    fn destroy(&mut self) {
        self.events = Vec::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn event(ts: u64) -> RecordingEvent {
        RecordingEvent::new(RecordingEvent::INCREMENTAL_SNAPSHOT, ts, json!({ "source": 1 }))
    }

    #[tokio::test]
    async fn test_finish_is_destructive() {
        let mut buffer = ArrayEventBuffer::new();
        buffer.add_event(event(1), false).unwrap();
        buffer.add_event(event(2), false).unwrap();

        let pending = buffer.finish();
        // swapped out before the future runs
        assert!(buffer.is_empty());

        let payload = pending.await.unwrap();
        let decoded: Vec<RecordingEvent> = serde_json::from_slice(payload.as_bytes()).unwrap();
        assert_eq!(decoded, vec![event(1), event(2)]);
    }

    #[tokio::test]
    async fn test_checkout_replaces_buffer() {
        let mut buffer = ArrayEventBuffer::new();
        for ts in 0..5 {
            buffer.add_event(event(ts), false).unwrap();
        }
        let checkout = RecordingEvent::new(RecordingEvent::FULL_SNAPSHOT, 10, json!({ "node": {} }));
        buffer.add_event(checkout.clone(), true).unwrap();
        assert_eq!(buffer.len(), 1);

        let payload = buffer.finish().await.unwrap();
        let decoded: Vec<RecordingEvent> = serde_json::from_slice(payload.as_bytes()).unwrap();
        assert_eq!(decoded, vec![checkout]);
    }

    #[tokio::test]
    async fn test_empty_finish() {
        let mut buffer = ArrayEventBuffer::new();
        let payload = buffer.finish().await.unwrap();
        assert_eq!(payload, RecordingPayload::Text("[]".to_string()));
    }

    proptest! {
        #[test]
        fn prop_ordered_round_trip(timestamps in proptest::collection::vec(0u64..u64::MAX / 2, 0..64)) {
            let mut buffer = ArrayEventBuffer::new();
            let events: Vec<_> = timestamps.iter().map(|ts| event(*ts)).collect();
            for e in &events {
                buffer.add_event(e.clone(), false).unwrap();
            }

            let payload = futures::executor::block_on(buffer.finish()).unwrap();
            let decoded: Vec<RecordingEvent> = serde_json::from_slice(payload.as_bytes()).unwrap();
            prop_assert_eq!(decoded, events);
        }
    }
}
