// packages/replay/benches/buffer_bench.rs
//! Add/finish throughput of the event buffers

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use sentra_replay::buffer::compressor::CompressionLevel;
use sentra_replay::buffer::{ArrayEventBuffer, CompressedEventBuffer, EventBuffer, RecordingEvent};
use serde_json::json;

fn events(count: usize) -> Vec<RecordingEvent> {
    (0..count)
        .map(|i| {
            RecordingEvent::new(
                RecordingEvent::INCREMENTAL_SNAPSHOT,
                1_700_000_000_000 + i as u64,
                json!({
                    "source": 0,
                    "adds": [{ "parentId": i, "node": { "type": 3, "textContent": "hello world" } }],
                    "removes": [],
                }),
            )
        })
        .collect()
}

fn fill_and_finish(runtime: &tokio::runtime::Runtime, buffer: &mut dyn EventBuffer, batch: &[RecordingEvent]) -> usize {
    for event in batch {
        buffer.add_event(event.clone(), false).unwrap();
    }
    runtime.block_on(buffer.finish()).unwrap().len()
}

fn bench_buffers(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    let mut group = c.benchmark_group("segment");
    for size in [100usize, 1_000] {
        let batch = events(size);
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("array", size), &batch, |b, batch| {
            let mut buffer = ArrayEventBuffer::new();
            b.iter(|| black_box(fill_and_finish(&runtime, &mut buffer, batch)));
        });

        group.bench_with_input(BenchmarkId::new("compressed", size), &batch, |b, batch| {
            let mut buffer = CompressedEventBuffer::new(CompressionLevel::Fast, None).unwrap();
            b.iter(|| black_box(fill_and_finish(&runtime, &mut buffer, batch)));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_buffers);
criterion_main!(benches);
