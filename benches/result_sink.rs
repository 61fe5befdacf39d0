//! Append and incremental snapshot throughput of the result sink.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use vcs_helper::ResultSink;
use vcs_helper::services::classify;

const DIFF_LINES: [&str; 4] = ["Index: src/main.c", "-old line", "+new line", " context"];

fn bench_append(c: &mut Criterion) {
    let mut group = c.benchmark_group("append");
    for count in [1_000usize, 10_000] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                let sink = ResultSink::new();
                for i in 0..count {
                    let text = DIFF_LINES[i % DIFF_LINES.len()];
                    sink.append(text, classify(text));
                }
                black_box(sink.len())
            });
        });
    }
    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let sink = ResultSink::new();
    for i in 0..10_000 {
        let text = DIFF_LINES[i % DIFF_LINES.len()];
        sink.append(text, classify(text));
    }

    c.bench_function("snapshot_tail_100", |b| {
        b.iter(|| black_box(sink.snapshot(black_box(9_900)).len()));
    });

    // Foreground pattern: append a batch, then fetch only what is new.
    c.bench_function("append_then_drain_batches", |b| {
        b.iter(|| {
            let sink = ResultSink::new();
            let mut cursor = 0;
            for _ in 0..100 {
                for text in DIFF_LINES {
                    sink.append(text, classify(text));
                }
                cursor += sink.snapshot(cursor).len();
            }
            black_box(cursor)
        });
    });
}

criterion_group!(benches, bench_append, bench_snapshot);
criterion_main!(benches);
