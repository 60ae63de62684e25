//! Performance metrics over the equity curve and trade ledger.
//!
//! Every metric is a pure function: equity curve and/or trade rows in,
//! scalar out. Rounding happens once, in [`PerformanceMetrics::compute`].

use papertrade_core::domain::{round_to, Trade};
use serde::{Serialize, Serializer};

/// Periods per year for a nominal bar timeframe. Unknown timeframes use 252.
pub fn annualization_factor(timeframe: &str) -> f64 {
    match timeframe {
        "1m" => 525_600.0,
        "5m" => 105_120.0,
        "15m" => 35_040.0,
        "30m" => 17_520.0,
        "1h" => 8_760.0,
        "2h" => 4_380.0,
        "4h" => 2_190.0,
        "1d" => 365.0,
        _ => 252.0,
    }
}

// ─── Equity curve metrics ───────────────────────────────────────────

/// Bar-to-bar returns. Non-finite returns (from a zero equity) are skipped.
pub fn period_returns(equity_curve: &[f64]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| w[1] / w[0] - 1.0)
        .filter(|r| r.is_finite())
        .collect()
}

/// Annualised Sharpe-like ratio with sample standard deviation.
///
/// Zero with fewer than two returns or zero variance.
pub fn sharpe_ratio(equity_curve: &[f64], timeframe: &str) -> f64 {
    let returns = period_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let std = var.sqrt();
    if !std.is_finite() || std <= 0.0 {
        return 0.0;
    }
    mean / std * annualization_factor(timeframe).sqrt()
}

/// Largest peak-to-trough decline as a positive fraction.
///
/// Peaks that are not positive contribute nothing.
pub fn max_drawdown(equity_curve: &[f64]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;
    for &value in equity_curve {
        if value > peak {
            peak = value;
        }
        if peak > 0.0 {
            max_dd = max_dd.max((peak - value) / peak);
        }
    }
    max_dd
}

// ─── Trade metrics ──────────────────────────────────────────────────

/// Realised P&L of every closing row.
pub fn closed_pnls(trades: &[Trade]) -> Vec<f64> {
    trades.iter().filter_map(|t| t.pnl).collect()
}

/// Percentage of closed trades with positive P&L.
pub fn win_rate(pnls: &[f64]) -> f64 {
    if pnls.is_empty() {
        return 0.0;
    }
    let wins = pnls.iter().filter(|p| **p > 0.0).count();
    wins as f64 / pnls.len() as f64 * 100.0
}

/// Gross profit over gross loss. Breakeven trades count as losses.
///
/// Infinite when there are profits but no losses, zero with no trades.
pub fn profit_factor(pnls: &[f64]) -> f64 {
    let gross_profit: f64 = pnls.iter().filter(|p| **p > 0.0).sum();
    let gross_loss: f64 = -pnls.iter().filter(|p| **p <= 0.0).sum::<f64>();
    if gross_loss > 0.0 {
        gross_profit / gross_loss
    } else if gross_profit > 0.0 {
        f64::INFINITY
    } else {
        0.0
    }
}

pub fn avg_trade_pnl(pnls: &[f64]) -> f64 {
    if pnls.is_empty() {
        0.0
    } else {
        pnls.iter().sum::<f64>() / pnls.len() as f64
    }
}

/// JSON has no infinity; write it as the string `"Infinity"`.
pub(crate) fn finite_or_label<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    if value.is_finite() {
        serializer.serialize_f64(*value)
    } else if value.is_nan() {
        serializer.serialize_none()
    } else if *value > 0.0 {
        serializer.serialize_str("Infinity")
    } else {
        serializer.serialize_str("-Infinity")
    }
}

/// Aggregate performance metrics for one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformanceMetrics {
    pub initial_equity: f64,
    pub final_equity: f64,
    pub total_return: f64,
    pub sharpe: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    /// Closed trades.
    pub trade_count: usize,
    /// All ledger rows, opens included.
    pub trades: usize,
    #[serde(serialize_with = "finite_or_label")]
    pub profit_factor: f64,
    pub avg_trade_pnl: f64,
}

impl PerformanceMetrics {
    pub fn compute(
        initial_cash: f64,
        final_cash: f64,
        equity_curve: &[f64],
        trades: &[Trade],
        timeframe: &str,
    ) -> Self {
        let pnls = closed_pnls(trades);
        let total_return = if initial_cash > 0.0 {
            final_cash / initial_cash - 1.0
        } else {
            0.0
        };
        let pf = profit_factor(&pnls);
        Self {
            initial_equity: initial_cash,
            final_equity: final_cash,
            total_return: round_to(total_return, 6),
            sharpe: round_to(sharpe_ratio(equity_curve, timeframe), 6),
            max_drawdown: round_to(max_drawdown(equity_curve), 6),
            win_rate: round_to(win_rate(&pnls), 2),
            trade_count: pnls.len(),
            trades: trades.len(),
            profit_factor: if pf.is_finite() { round_to(pf, 6) } else { pf },
            avg_trade_pnl: round_to(avg_trade_pnl(&pnls), 8),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use papertrade_core::domain::{OrderSide, OrderType, TradeReason};

    fn close_row(pnl: f64) -> Trade {
        let ts = Utc.timestamp_millis_opt(0).unwrap();
        Trade {
            side: OrderSide::Sell,
            timestamp: ts,
            price: 1.0,
            qty: 1.0,
            amount: None,
            pnl: Some(pnl),
            pnl_pct: Some(0.0),
            reason: TradeReason::ExitSignal,
            order_type: OrderType::Market,
            position_open_timestamp: ts,
        }
    }

    fn open_row() -> Trade {
        Trade {
            side: OrderSide::Buy,
            amount: Some(1.0),
            pnl: None,
            pnl_pct: None,
            reason: TradeReason::EntrySignal,
            ..close_row(0.0)
        }
    }

    #[test]
    fn annualization_lookup() {
        assert_eq!(annualization_factor("1h"), 8_760.0);
        assert_eq!(annualization_factor("1d"), 365.0);
        assert_eq!(annualization_factor("3w"), 252.0);
    }

    #[test]
    fn sharpe_zero_for_flat_or_short_curves() {
        assert_eq!(sharpe_ratio(&[100.0, 100.0, 100.0], "1h"), 0.0);
        assert_eq!(sharpe_ratio(&[100.0, 101.0], "1h"), 0.0);
    }

    #[test]
    fn sharpe_uses_sample_std_and_annualization() {
        let curve = [100.0, 101.0, 100.0, 102.0];
        let r = period_returns(&curve);
        let mean = r.iter().sum::<f64>() / 3.0;
        let var = r.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / 2.0;
        let expected = mean / var.sqrt() * 365.0_f64.sqrt();
        assert!((sharpe_ratio(&curve, "1d") - expected).abs() < 1e-12);
    }

    #[test]
    fn drawdown_from_running_peak() {
        assert_eq!(max_drawdown(&[]), 0.0);
        assert!((max_drawdown(&[100.0, 120.0, 90.0, 130.0, 117.0]) - 0.25).abs() < 1e-12);
    }

    #[test]
    fn profit_factor_edges() {
        assert_eq!(profit_factor(&[]), 0.0);
        assert_eq!(profit_factor(&[5.0, 1.0]), f64::INFINITY);
        assert_eq!(profit_factor(&[6.0, -2.0, 0.0]), 3.0);
        assert_eq!(profit_factor(&[0.0]), 0.0);
    }

    #[test]
    fn win_rate_is_percent() {
        assert_eq!(win_rate(&[1.0, -1.0, 0.0, 2.0]), 50.0);
    }

    #[test]
    fn compute_counts_closed_trades_only() {
        let trades = vec![open_row(), close_row(10.0), open_row(), close_row(-5.0)];
        let m = PerformanceMetrics::compute(1_000.0, 1_005.0, &[1_000.0, 1_010.0, 1_005.0], &trades, "1h");
        assert_eq!(m.trade_count, 2);
        assert_eq!(m.trades, 4);
        assert_eq!(m.win_rate, 50.0);
        assert_eq!(m.profit_factor, 2.0);
        assert_eq!(m.avg_trade_pnl, 2.5);
        assert_eq!(m.total_return, 0.005);
    }

    #[test]
    fn infinite_profit_factor_serializes_as_label() {
        let trades = vec![open_row(), close_row(3.0)];
        let m = PerformanceMetrics::compute(100.0, 103.0, &[100.0, 103.0], &trades, "1h");
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["profit_factor"], "Infinity");
    }
}
