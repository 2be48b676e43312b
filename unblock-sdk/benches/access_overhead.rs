use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use unblock_sdk::{
    aggregate, AsyncResult, BlockEvent, FixedCapture, FrameFilter, Microseconds, Output, Promise,
    StackFingerprint, Unblock,
};

fn unblock() -> Unblock {
    Unblock::builder()
        .stack_capture(FixedCapture::new(["bench::handler", "bench::main"]))
        .output(Output::callback(|_| {}))
        .build()
}

/// Benchmark a ready retrieval without an active scope (pure passthrough)
fn bench_unscoped_get(c: &mut Criterion) {
    let registry = unblock().registry();
    let handle = registry.instrument("bench.Get", Promise::<u64>::ready(1));

    c.bench_function("unscoped_ready_get", |b| {
        b.iter(|| black_box(handle.get()));
    });
}

/// Benchmark a ready retrieval inside a scope (counted, not timed)
fn bench_scoped_get(c: &mut Criterion) {
    let registry = unblock().registry();
    let _scope = registry.begin("bench").unwrap();
    let handle = registry.instrument("bench.Get", Promise::<u64>::ready(1));

    c.bench_function("scoped_ready_get", |b| {
        b.iter(|| black_box(handle.get()));
    });
}

/// Benchmark a full scope lifecycle with a handful of retrievals
fn bench_scope_lifecycle(c: &mut Criterion) {
    let registry = unblock().registry();

    c.bench_function("scope_lifecycle", |b| {
        b.iter(|| {
            let scope = registry.begin("bench").unwrap();
            for i in 0..8u64 {
                let handle = registry.instrument("bench.Get", Promise::<u64>::ready(i));
                black_box(handle.get()).ok();
            }
            black_box(scope.finish())
        });
    });
}

/// Benchmark aggregation with varying event counts
fn bench_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate");
    let filter = FrameFilter::default();

    for count in [10usize, 100, 1000].iter() {
        let events: Vec<BlockEvent> = (0..*count)
            .map(|i| {
                let frames = [format!("app::site_{}", i % 7), "app::main".to_string()];
                BlockEvent::new(
                    format!("svc.Method{}", i % 3),
                    StackFingerprint::from_frames(frames, &filter),
                    0,
                    Microseconds::from_micros(i as u64),
                )
            })
            .collect();

        group.bench_with_input(BenchmarkId::from_parameter(count), &events, |b, events| {
            b.iter(|| black_box(aggregate(events)));
        });
    }
    group.finish();
}

criterion_group!(
    benches,
    bench_unscoped_get,
    bench_scoped_get,
    bench_scope_lifecycle,
    bench_aggregate
);
criterion_main!(benches);
