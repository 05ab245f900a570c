//! Latency benchmarks for the physics tick.
//!
//! The tick sits on every request's admission path, so it is budgeted in
//! nanoseconds: normalize + advance must stay well under a microsecond.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use atrion_physics::{
    advance, normalize_sample, PhysicsConfig, RouteState, SloSpec, Telemetry, Thresholds,
    TickInput,
};

fn bench_advance(c: &mut Criterion) {
    let mut group = c.benchmark_group("tick");
    let config = PhysicsConfig::default();
    let slo = SloSpec::default();
    let weights = slo.derive_weights();
    let baselines = slo.derive_baselines().unwrap();

    for mode in ["bootstrap", "operational"] {
        let mut state = RouteState::bootstrap("bench", &config, 0);
        let mut now = 0;
        if mode == "operational" {
            // Walk past warm-up so the full physics path is measured.
            for _ in 0..=config.bootstrap_ticks {
                now += 100;
                let pressure =
                    normalize_sample(&Telemetry::new(120.0, 0.02, 0.5), &baselines, config.tanh_scale);
                state = advance(
                    &state,
                    &TickInput {
                        pressure,
                        weights: &weights,
                        config: &config,
                        now_ms: now,
                        thresholds: Thresholds::static_defaults(&config),
                        profile_scar_multiplier: 1.0,
                        scar_inflation: 0.0,
                    },
                )
                .state;
            }
        }

        group.bench_with_input(BenchmarkId::new("advance", mode), &state, |b, state| {
            let pressure =
                normalize_sample(&Telemetry::new(150.0, 0.05, 0.7), &baselines, config.tanh_scale);
            b.iter(|| {
                advance(
                    black_box(state),
                    &TickInput {
                        pressure,
                        weights: &weights,
                        config: &config,
                        now_ms: now + 100,
                        thresholds: Thresholds::static_defaults(&config),
                        profile_scar_multiplier: 1.0,
                        scar_inflation: 0.0,
                    },
                )
            })
        });
    }

    group.finish();
}

fn bench_normalize(c: &mut Criterion) {
    let slo = SloSpec::default();
    let baselines = slo.derive_baselines().unwrap();
    let sample = Telemetry::new(230.0, 0.04, 0.9);

    c.bench_function("normalize_sample", |b| {
        b.iter(|| normalize_sample(black_box(&sample), &baselines, 1.0))
    });
}

criterion_group!(benches, bench_advance, bench_normalize);
criterion_main!(benches);
