//! Latency benchmark for the full admission path.
//!
//! `route()` runs on every request: normalize, tick, decide, cache write,
//! sync enqueue, observer dispatch. The budget is single-digit
//! microseconds.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use atrion_core::{
    Engine, EngineOptions, InMemoryProvider, RouteOptions, Telemetry, VirtualClock,
};

fn bench_route(c: &mut Criterion) {
    let mut group = c.benchmark_group("route");

    for (label, with_provider) in [("standalone", false), ("with_provider", true)] {
        let clock = VirtualClock::new(0);
        let engine = Engine::new(EngineOptions {
            state_provider: with_provider
                .then(|| Arc::new(InMemoryProvider::new()) as _),
            clock: Some(Arc::new(clock.clone())),
            ..Default::default()
        })
        .unwrap();
        engine.connect().unwrap();

        // Warm the route past bootstrap so the steady-state path is measured.
        for _ in 0..10 {
            clock.advance(100);
            engine
                .route("bench", &Telemetry::new(120.0, 0.02, 0.5), RouteOptions::default())
                .unwrap();
        }

        group.bench_with_input(BenchmarkId::new("route", label), &(), |b, _| {
            b.iter(|| {
                clock.advance(10);
                engine.route(
                    black_box("bench"),
                    black_box(&Telemetry::new(150.0, 0.05, 0.7)),
                    RouteOptions::default(),
                )
            })
        });

        engine.disconnect().unwrap();
    }

    group.finish();
}

criterion_group!(benches, bench_route);
criterion_main!(benches);
