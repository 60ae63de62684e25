//! Per-bar signal rules.
//!
//! Everything here is a pure function of one bar, its indicators, the
//! overlays and the current position sign. The loop in
//! [`super::loop_runner`] applies the results to the state.

use crate::config::{StrategyConfig, StrategyMode};
use crate::indicators::IndicatorSnapshot;
use std::collections::VecDeque;

/// Rule set evaluated on a bar after adaptive routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveMode {
    MeanReversion,
    Momentum,
    StatArb,
}

/// Raw mean-reversion and momentum signals in {-1, 0, 1}.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RawSignals {
    pub mean_reversion: f64,
    pub momentum: f64,
}

fn flag(b: bool) -> f64 {
    if b {
        1.0
    } else {
        0.0
    }
}

fn mean_reversion_rules(close: f64, ind: &IndicatorSnapshot, cfg: &StrategyConfig) -> (bool, bool) {
    let entry = close <= ind.bb_lower && ind.rsi < cfg.rsi_buy;
    let exit = close >= ind.bb_upper && ind.rsi > cfg.rsi_sell;
    (entry, exit)
}

fn momentum_rules(close: f64, ind: &IndicatorSnapshot, cfg: &StrategyConfig) -> (bool, bool) {
    let entry = ind.ma_fast > ind.ma_slow && close > ind.ma_fast && ind.rsi > cfg.rsi_buy;
    let exit = ind.ma_fast <= ind.ma_slow || ind.rsi > cfg.rsi_sell + 5.0;
    (entry, exit)
}

/// Both raw signals, computed whatever the active mode is.
pub fn raw_signals(close: f64, ind: &IndicatorSnapshot, cfg: &StrategyConfig) -> RawSignals {
    let (mr_long, mr_short) = mean_reversion_rules(close, ind, cfg);
    let (mo_long, mo_short) = momentum_rules(close, ind, cfg);
    RawSignals {
        mean_reversion: flag(mr_long) - flag(mr_short),
        momentum: flag(mo_long) - flag(mo_short),
    }
}

/// Pearson correlation, `None` with fewer than two points or when either
/// side has fewer than two distinct values.
pub fn pearson(left: &VecDeque<f64>, right: &VecDeque<f64>) -> Option<f64> {
    let n = left.len();
    if n < 2 || n != right.len() {
        return None;
    }
    let varies = |s: &VecDeque<f64>| s.iter().any(|v| *v != s[0]);
    if !varies(left) || !varies(right) {
        return None;
    }
    let mean_l = left.iter().sum::<f64>() / n as f64;
    let mean_r = right.iter().sum::<f64>() / n as f64;
    let (mut cov, mut var_l, mut var_r) = (0.0, 0.0, 0.0);
    for (l, r) in left.iter().zip(right) {
        let (dl, dr) = (l - mean_l, r - mean_r);
        cov += dl * dr;
        var_l += dl * dl;
        var_r += dr * dr;
    }
    let denom = (var_l * var_r).sqrt();
    let corr = cov / denom;
    corr.is_finite().then_some(corr)
}

/// Resolve the rule set for this bar.
///
/// Adaptive routes to momentum in an up-trend strong enough to clear the
/// threshold, else mean-reversion. With routing off it stays mean-reversion.
pub fn resolve_mode(cfg: &StrategyConfig, ind: &IndicatorSnapshot) -> ActiveMode {
    match cfg.strategy_mode {
        StrategyMode::Adaptive => {
            let trending = ind.ma_fast > ind.ma_slow && ind.trend_strength >= cfg.trend_threshold;
            if cfg.use_regime && trending {
                ActiveMode::Momentum
            } else {
                ActiveMode::MeanReversion
            }
        }
        StrategyMode::MeanReversion => ActiveMode::MeanReversion,
        StrategyMode::Momentum | StrategyMode::MomentumOnly => ActiveMode::Momentum,
        StrategyMode::StatArb => ActiveMode::StatArb,
    }
}

/// Inputs of one decision besides the bar itself.
#[derive(Debug, Clone, Copy)]
pub struct DecisionContext {
    pub probability: f64,
    pub sentiment: f64,
    pub correlation_blocked: bool,
    /// Sign of the open position: -1, 0 or 1.
    pub position_sign: f64,
}

/// What the rules say to do on this bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decision {
    pub mode: ActiveMode,
    pub entry: bool,
    /// +1 long, -1 short. Only stat-arb can go short.
    pub entry_sign: f64,
    pub exit: bool,
    pub stop: bool,
}

fn statarb_zscore(close: f64, ind: &IndicatorSnapshot) -> f64 {
    if ind.std > 0.0 {
        (close - ind.sma) / ind.std
    } else {
        0.0
    }
}

/// Entry, exit and stop conditions with every overlay and block applied.
pub fn decide(close: f64, ind: &IndicatorSnapshot, cfg: &StrategyConfig, ctx: &DecisionContext) -> Decision {
    let mode = resolve_mode(cfg, ind);
    let ml_on = cfg.ml.enabled;
    let conf = cfg.ml.confidence;
    let sentiment_ok = ctx.sentiment >= cfg.sentiment.threshold;

    let mut decision = match mode {
        ActiveMode::MeanReversion | ActiveMode::Momentum => {
            let (entry, exit) = if mode == ActiveMode::Momentum {
                momentum_rules(close, ind, cfg)
            } else {
                mean_reversion_rules(close, ind, cfg)
            };
            Decision {
                mode,
                entry: entry && !ctx.correlation_blocked,
                entry_sign: 1.0,
                exit,
                stop: false,
            }
        }
        ActiveMode::StatArb => {
            let z = statarb_zscore(close, ind);
            let mut long = z <= -cfg.statarb_z_entry;
            let mut short = z >= cfg.statarb_z_entry;
            if ml_on {
                long = long && ctx.probability >= conf;
                short = short && (1.0 - ctx.probability) >= conf;
            }
            if ctx.correlation_blocked {
                long = false;
                short = false;
            }
            long = long && sentiment_ok;
            short = short && sentiment_ok;

            let sign = if short && !long {
                -1.0
            } else if long {
                1.0
            } else {
                0.0
            };
            let held_long = ctx.position_sign > 0.0;
            let held_short = ctx.position_sign < 0.0;
            Decision {
                mode,
                entry: sign != 0.0,
                entry_sign: sign,
                exit: (held_long && z >= cfg.statarb_z_exit) || (held_short && z <= -cfg.statarb_z_exit),
                stop: (held_long && z >= cfg.statarb_z_stop) || (held_short && z <= -cfg.statarb_z_stop),
            }
        }
    };

    if ml_on && conf >= 0.0 {
        if mode != ActiveMode::StatArb {
            decision.entry = decision.entry && ctx.probability >= conf && sentiment_ok;
        }
        decision.exit = decision.exit || ctx.probability <= 1.0 - conf;
    } else if mode != ActiveMode::StatArb {
        decision.entry = decision.entry && sentiment_ok;
    }
    decision
}
