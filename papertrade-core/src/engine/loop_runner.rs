//! Bar-by-bar strategy/risk loop.
//!
//! Per bar, in order:
//! 1. Mark equity, update the peak, trip the drawdown circuit if needed
//! 2. Skip the rest of the bar once halted
//! 3. Raw signals and the correlation guard
//! 4. Mode routing, entry/exit/stop rules, overlay gating
//! 5. Position checks (ATR stop, z-stop, soft exit); a close ends the bar
//! 6. Entry when flat
//!
//! Anything still open after the last bar is closed with `eod_close`.

use super::signals::{decide, pearson, raw_signals, ActiveMode, Decision, DecisionContext};
use super::state::{PositionState, SimulationState};
use crate::config::StrategyConfig;
use crate::domain::{round_to, EntryBlockReason, RiskControls, RiskEvent, Trade, TradeReason};
use crate::indicators::ReadyRow;
use crate::overlay::NEUTRAL_PROBABILITY;

/// Spread prices below this magnitude cannot size a stat-arb entry.
pub const SPREAD_PRICE_FLOOR: f64 = 1e-6;

/// Lowest price an ATR stop may fill at.
const MIN_STOP_PRICE: f64 = 1e-8;

/// Overlays aligned 1:1 with `rows`. Short overlays read as neutral.
#[derive(Debug, Clone, Copy)]
pub struct SimulationInput<'a> {
    pub rows: &'a [ReadyRow],
    pub probability: &'a [f64],
    pub sentiment: &'a [f64],
}

/// Everything a run produces before metrics.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationOutcome {
    pub initial_cash: f64,
    pub final_cash: f64,
    pub equity_curve: Vec<f64>,
    pub trades: Vec<Trade>,
    pub risk_events: Vec<RiskEvent>,
    pub risk_controls: RiskControls,
    pub halted: bool,
    pub halt_reason: Option<String>,
    /// Position state after the last bar, before the end-of-run close.
    pub position_state: PositionState,
    pub bars: usize,
}

/// Run the state machine over every ready row.
///
/// `config` must already be normalized.
pub fn run_simulation(config: &StrategyConfig, input: SimulationInput<'_>) -> SimulationOutcome {
    let controls = RiskControls::new(
        config.max_drawdown,
        config.strategy_correlation_cap,
        config.strategy_correlation_window,
    );
    let mut state = SimulationState::new(config.initial_cash, config.fee_rate, controls);

    for (i, row) in input.rows.iter().enumerate() {
        let probability = if config.ml.enabled {
            input.probability.get(i).copied().unwrap_or(NEUTRAL_PROBABILITY)
        } else {
            NEUTRAL_PROBABILITY
        };
        let sentiment = input.sentiment.get(i).copied().unwrap_or(0.0);
        step(&mut state, config, row, probability, sentiment);
    }

    let position_state = state.position_state();
    if let Some(last) = input.rows.last() {
        state.close(last.bar.timestamp, last.bar.close, TradeReason::EodClose);
    }

    tracing::info!(
        bars = input.rows.len(),
        trades = state.trades.len(),
        risk_events = state.risk_events.len(),
        halted = state.halted,
        final_cash = state.cash,
        "simulation finished"
    );

    SimulationOutcome {
        initial_cash: config.initial_cash,
        final_cash: state.cash,
        equity_curve: state.equity_curve,
        trades: state.trades,
        risk_events: state.risk_events,
        risk_controls: state.risk_controls,
        halted: state.halted,
        halt_reason: state.halt_reason,
        position_state,
        bars: input.rows.len(),
    }
}

/// Advance the state machine by one bar.
pub fn step(state: &mut SimulationState, cfg: &StrategyConfig, row: &ReadyRow, probability: f64, sentiment: f64) {
    let bar = &row.bar;
    let ind = &row.ind;
    let ts = bar.timestamp;

    // ─── Mark-to-market and drawdown circuit ───
    let equity = state.equity(bar.close);
    if equity > state.peak_equity {
        state.peak_equity = equity;
    }
    let drawdown = if state.peak_equity > 0.0 {
        1.0 - equity / state.peak_equity
    } else {
        0.0
    };
    if !state.halted && state.risk_controls.drawdown_circuit_enabled && drawdown >= cfg.max_drawdown {
        state.close(ts, bar.close, TradeReason::DrawdownHalt);
        state.halted = true;
        state.halt_reason = Some(format!("drawdown {:.4} exceeded {}", drawdown, cfg.max_drawdown));
        state.risk_controls.drawdown_circuit_hits += 1;
        state.record(RiskEvent::DrawdownCircuitBreaker {
            timestamp: ts,
            equity: round_to(equity, 8),
            drawdown: round_to(drawdown, 6),
        });
    }
    state.equity_curve.push(equity);
    if state.halted {
        return;
    }

    // ─── Correlation guard ───
    let raw = raw_signals(bar.close, ind, cfg);
    state.history.push(raw.mean_reversion, raw.momentum);
    let mut correlation = None;
    if state.history.is_full() {
        let (momentum, mean_reversion) = state.history.series();
        correlation = pearson(momentum, mean_reversion);
        if let Some(c) = correlation {
            let peak = &mut state.risk_controls.max_strategy_correlation_abs;
            *peak = peak.max(c.abs());
        }
    }
    let cap = cfg.strategy_correlation_cap;
    let correlation_blocked = match correlation {
        Some(c) if cap > 0.0 && c.abs() > cap => {
            state.risk_controls.strategy_correlation_hits += 1;
            state.record(RiskEvent::StrategyCorrelationBlock {
                timestamp: ts,
                correlation: round_to(c, 8),
                cap,
            });
            true
        }
        _ => false,
    };

    // ─── Rules ───
    let qty = state.qty();
    let ctx = DecisionContext {
        probability,
        sentiment,
        correlation_blocked,
        position_sign: if qty > 0.0 {
            1.0
        } else if qty < 0.0 {
            -1.0
        } else {
            0.0
        },
    };
    let decision = decide(bar.close, ind, cfg, &ctx);

    // ─── Position checks ───
    if let Some(pos) = state.position {
        if ind.atr > 0.0 && close_on_signal(state, cfg, row, pos.qty, pos.entry_price, &decision) {
            return;
        }
    }

    // ─── Entry ───
    if state.position.is_none() && decision.entry {
        enter(state, cfg, row, &decision, correlation_blocked);
    }
}

/// Apply stop and exit rules to an open position. Returns true if it closed.
fn close_on_signal(
    state: &mut SimulationState,
    cfg: &StrategyConfig,
    row: &ReadyRow,
    qty: f64,
    entry_price: f64,
    decision: &Decision,
) -> bool {
    let bar = &row.bar;
    let stop_distance = cfg.stop_atr_mult * row.ind.atr;
    let ts = bar.timestamp;

    let (stop_price, stop_hit, atr_reason) = if qty > 0.0 {
        let stop_price = entry_price - stop_distance;
        (stop_price, bar.low <= stop_price, TradeReason::StopLossAtr)
    } else if qty < 0.0 {
        let stop_price = entry_price + stop_distance;
        (stop_price, bar.high >= stop_price, TradeReason::StopLossAtrShort)
    } else {
        return false;
    };
    // Both stops fill at the ATR stop level, never at the bar close.
    if stop_hit {
        state.close(ts, stop_price.max(MIN_STOP_PRICE), atr_reason);
        return true;
    }
    if decision.stop {
        state.close(ts, stop_price.max(MIN_STOP_PRICE), TradeReason::StatArbStopLoss);
        return true;
    }
    if decision.exit {
        state.close(ts, bar.close, TradeReason::ExitSignal);
        return true;
    }
    false
}

fn enter(state: &mut SimulationState, cfg: &StrategyConfig, row: &ReadyRow, decision: &Decision, blocked: bool) {
    let stat_arb = decision.mode == ActiveMode::StatArb;
    if stat_arb && blocked {
        return;
    }
    let allocation = (state.cash * cfg.max_portfolio_risk).min(state.cash * cfg.position_size);
    if allocation <= 0.0 {
        return;
    }

    let ts = row.bar.timestamp;
    let close = row.bar.close;
    let (qty, reason) = if stat_arb {
        if !close.is_finite() || close.abs() < SPREAD_PRICE_FLOOR {
            state.record(RiskEvent::StatarbEntryBlock {
                timestamp: ts,
                reason: EntryBlockReason::InvalidSpreadPrice,
                price: close.is_finite().then_some(close),
            });
            return;
        }
        let size_price = close.abs().max(SPREAD_PRICE_FLOOR);
        (allocation / size_price * decision.entry_sign, TradeReason::EntrySignalStatArb)
    } else {
        (allocation / close, TradeReason::EntrySignal)
    };

    let fee = (allocation * cfg.fee_rate).abs();
    if qty != 0.0 && qty.is_finite() {
        state.open(ts, close, qty, fee, reason);
    }
}
