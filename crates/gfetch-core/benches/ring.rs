//! Ring buffer throughput benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use gfetch_core::RingBuffer;

fn bench_ring(c: &mut Criterion) {
    c.bench_function("ring_enqueue_dequeue_128", |b| {
        let mut ring = RingBuffer::with_capacity(128);
        b.iter(|| {
            for i in 0..128u32 {
                ring.enqueue(black_box(i));
            }
            for _ in 0..128 {
                black_box(ring.dequeue());
            }
        });
    });

    c.bench_function("ring_interleaved", |b| {
        let mut ring = RingBuffer::with_capacity(16);
        b.iter(|| {
            for i in 0..64u32 {
                if !ring.full() {
                    ring.enqueue(black_box(i));
                }
                if !ring.empty() {
                    black_box(ring.dequeue());
                }
            }
        });
    });
}

criterion_group!(benches, bench_ring);
criterion_main!(benches);
