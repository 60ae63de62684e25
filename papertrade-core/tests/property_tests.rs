//! Property tests for engine invariants.
//!
//! Uses proptest to verify:
//! 1. Indicator readiness: no ready row carries an undefined indicator
//! 2. Spread positivity: the built spread close is always > 0
//! 3. Flat at the end: no open position survives the final bar
//! 4. Halt is terminal: no entry is written after a drawdown halt

use papertrade_core::domain::{Bar, RiskEvent};
use papertrade_core::engine::{run_simulation, SimulationInput};
use papertrade_core::indicators::{IndicatorFrame, IndicatorParams};
use papertrade_core::spread::build_pair_spread;
use papertrade_core::{StrategyConfig, StrategyMode};
use proptest::prelude::*;

const T0: i64 = 1_700_000_000_000;
const HOUR: i64 = 3_600_000;

// ── Strategies (proptest) ────────────────────────────────────────────

/// Random walk of closes as multiplicative steps from 100.
fn arb_closes(min_len: usize, max_len: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-0.04..0.04_f64, min_len..max_len).prop_map(|steps| {
        let mut price = 100.0;
        steps
            .into_iter()
            .map(|s| {
                price *= 1.0 + s;
                price
            })
            .collect()
    })
}

fn to_bars(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &c)| Bar::from_millis(T0 + i as i64 * HOUR, c, c * 1.01, c * 0.99, c, 500.0).unwrap())
        .collect()
}

fn arb_params() -> impl Strategy<Value = IndicatorParams> {
    (2usize..30, 0.5..3.0_f64, 2usize..20, 2usize..15, 2usize..20).prop_map(
        |(bb_window, bb_std, rsi_period, atr_window, slow_extra)| IndicatorParams {
            bb_window,
            bb_std,
            rsi_period,
            momentum_fast: 3,
            momentum_slow: 4 + slow_extra,
            atr_window,
        },
    )
}

fn sim_config(mode: StrategyMode, max_drawdown: f64) -> StrategyConfig {
    StrategyConfig {
        strategy_mode: mode,
        momentum_fast: 5,
        momentum_slow: 12,
        position_size: 1.0,
        max_portfolio_risk: 1.0,
        strategy_correlation_window: 20,
        max_drawdown,
        ..StrategyConfig::default()
    }
    .normalized()
}

// ── 1. Indicator readiness ───────────────────────────────────────────

proptest! {
    #[test]
    fn ready_rows_are_fully_defined(closes in arb_closes(10, 200), params in arb_params()) {
        let bars = to_bars(&closes);
        let frame = IndicatorFrame::compute(&bars, &params);
        let rows = frame.ready_rows(&bars);
        for row in &rows {
            prop_assert!(row.index >= frame.lookback());
            prop_assert!(row.ind.is_defined());
        }
    }
}

// ── 2. Spread positivity ─────────────────────────────────────────────

proptest! {
    #[test]
    fn spread_close_is_strictly_positive(
        closes in arb_closes(30, 150),
        scale in 0.2..5.0_f64,
        window in 1usize..40,
    ) {
        let primary = to_bars(&closes);
        let other: Vec<f64> = closes.iter().enumerate().map(|(i, c)| c * scale + (i as f64).sin()).collect();
        let secondary = to_bars(&other);
        let spread = build_pair_spread(&primary, &secondary, "PAIR2", window).unwrap();
        prop_assert!(!spread.is_empty());
        for bar in spread.bars() {
            prop_assert!(bar.close > 0.0);
        }
    }
}

// ── 3 & 4. State machine termination ────────────────────────────────

proptest! {
    #[test]
    fn run_ends_flat_and_halt_is_terminal(
        closes in arb_closes(60, 250),
        mode_index in 0usize..4,
        max_drawdown in 0.0..0.2_f64,
    ) {
        let mode = [
            StrategyMode::Adaptive,
            StrategyMode::MeanReversion,
            StrategyMode::Momentum,
            StrategyMode::StatArb,
        ][mode_index];
        let cfg = sim_config(mode, max_drawdown);
        let bars = to_bars(&closes);
        let rows = IndicatorFrame::compute(&bars, &cfg.indicator_params()).ready_rows(&bars);
        let outcome = run_simulation(&cfg, SimulationInput { rows: &rows, probability: &[], sentiment: &[] });

        let net_qty: f64 = outcome
            .trades
            .iter()
            .map(|t| if t.is_close() { -t.qty } else { t.qty })
            .sum();
        prop_assert!(net_qty.abs() < 1e-6);

        let halt = outcome.risk_events.iter().find_map(|e| match e {
            RiskEvent::DrawdownCircuitBreaker { timestamp, .. } => Some(*timestamp),
            _ => None,
        });
        if let Some(halt_ts) = halt {
            prop_assert!(outcome.halted);
            prop_assert!(outcome.trades.iter().filter(|t| t.timestamp >= halt_ts).all(|t| !t.reason.is_entry()));
        }
    }
}
