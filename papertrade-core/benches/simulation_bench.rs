//! Criterion benchmarks for papertrade hot paths.
//!
//! Benchmarks:
//! 1. Indicator frame precompute
//! 2. Per-bar state machine loop (adaptive and stat-arb)
//! 3. Pair-spread build

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use papertrade_core::domain::Bar;
use papertrade_core::engine::{run_simulation, SimulationInput};
use papertrade_core::indicators::IndicatorFrame;
use papertrade_core::spread::build_pair_spread;
use papertrade_core::{StrategyConfig, StrategyMode};

// ── Helpers ──────────────────────────────────────────────────────────

fn make_bars(n: usize, scale: f64) -> Vec<Bar> {
    (0..n)
        .map(|i| {
            let close = scale * (100.0 + (i as f64 * 0.1).sin() * 10.0 + i as f64 * 0.01);
            Bar::from_millis(
                1_700_000_000_000 + i as i64 * 3_600_000,
                close - 0.3,
                close + 1.5,
                close - 1.5,
                close,
                1_000.0 + (i % 500) as f64,
            )
            .unwrap()
        })
        .collect()
}

// ── Benchmarks ───────────────────────────────────────────────────────

fn bench_indicators(c: &mut Criterion) {
    let cfg = StrategyConfig::default().normalized();
    let params = cfg.indicator_params();
    let mut group = c.benchmark_group("indicator_frame");
    for n in [1_000usize, 10_000] {
        let bars = make_bars(n, 1.0);
        group.bench_with_input(BenchmarkId::from_parameter(n), &bars, |b, bars| {
            b.iter(|| IndicatorFrame::compute(black_box(bars), &params))
        });
    }
    group.finish();
}

fn bench_simulation(c: &mut Criterion) {
    let mut group = c.benchmark_group("simulation_loop");
    for mode in [StrategyMode::Adaptive, StrategyMode::StatArb] {
        let cfg = StrategyConfig {
            strategy_mode: mode,
            ..StrategyConfig::default()
        }
        .normalized();
        let bars = make_bars(10_000, 1.0);
        let rows = IndicatorFrame::compute(&bars, &cfg.indicator_params()).ready_rows(&bars);
        group.bench_function(BenchmarkId::from_parameter(mode.as_str()), |b| {
            b.iter(|| {
                run_simulation(
                    black_box(&cfg),
                    SimulationInput {
                        rows: &rows,
                        probability: &[],
                        sentiment: &[],
                    },
                )
            })
        });
    }
    group.finish();
}

fn bench_spread(c: &mut Criterion) {
    let primary = make_bars(5_000, 1.0);
    let secondary = make_bars(5_000, 3.0);
    c.bench_function("build_pair_spread_5k", |b| {
        b.iter(|| build_pair_spread(black_box(&primary), black_box(&secondary), "PAIR2", 100))
    });
}

criterion_group!(benches, bench_indicators, bench_simulation, bench_spread);
criterion_main!(benches);
