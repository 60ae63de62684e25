//! Indicator Engine.
//!
//! Every indicator implements [`Indicator`]: full bar history in, one value
//! per bar out, `f64::NAN` while warming up or when undefined. The
//! [`IndicatorFrame`] runs the fixed indicator set once per run and exposes
//! only rows where every value is defined. Undefined rows are dropped, never
//! zero-filled.

pub mod atr;
pub mod bollinger;
pub mod rsi;
pub mod sma;
pub mod trend;

pub use atr::{true_range, Atr};
pub use bollinger::{Bollinger, BollingerBand, StdDev};
pub use rsi::Rsi;
pub use sma::Sma;
pub use trend::TrendStrength;

use crate::domain::Bar;
use serde::{Deserialize, Serialize};

/// Trait for indicators.
///
/// Indicators take a full bar series and produce a numeric output series of
/// the same length. No value at bar t may depend on bars after t.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "sma_20", "atr_14").
    fn name(&self) -> &str;

    /// Number of leading bars that are always undefined.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the entire bar series.
    fn compute(&self, bars: &[Bar]) -> Vec<f64>;
}

/// Window parameters of the indicator set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorParams {
    pub bb_window: usize,
    pub bb_std: f64,
    pub rsi_period: usize,
    pub momentum_fast: usize,
    pub momentum_slow: usize,
    pub atr_window: usize,
}

/// All indicator values of one bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub sma: f64,
    pub std: f64,
    pub bb_upper: f64,
    pub bb_lower: f64,
    pub rsi: f64,
    pub ma_fast: f64,
    pub ma_slow: f64,
    pub trend_strength: f64,
    pub atr: f64,
}

impl IndicatorSnapshot {
    pub fn is_defined(&self) -> bool {
        [
            self.sma,
            self.std,
            self.bb_upper,
            self.bb_lower,
            self.rsi,
            self.ma_fast,
            self.ma_slow,
            self.trend_strength,
            self.atr,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

/// A bar with every indicator defined, plus its index in the source series.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadyRow {
    pub index: usize,
    pub bar: Bar,
    pub ind: IndicatorSnapshot,
}

/// Indicator values aligned 1:1 with the input bars.
#[derive(Debug, Clone)]
pub struct IndicatorFrame {
    rows: Vec<Option<IndicatorSnapshot>>,
    lookback: usize,
}

impl IndicatorFrame {
    pub fn compute(bars: &[Bar], params: &IndicatorParams) -> Self {
        let sma = Sma::new(params.bb_window);
        let std = StdDev::new(params.bb_window);
        let upper = Bollinger::new(params.bb_window, params.bb_std, BollingerBand::Upper);
        let lower = Bollinger::new(params.bb_window, params.bb_std, BollingerBand::Lower);
        let rsi = Rsi::new(params.rsi_period);
        let fast = Sma::new(params.momentum_fast);
        let slow = Sma::new(params.momentum_slow);
        let trend = TrendStrength::new(params.momentum_fast, params.momentum_slow);
        let atr = Atr::new(params.atr_window);

        let set: [&dyn Indicator; 9] = [&sma, &std, &upper, &lower, &rsi, &fast, &slow, &trend, &atr];
        let lookback = set.iter().map(|i| i.lookback()).max().unwrap_or(0);
        let series: Vec<Vec<f64>> = set.iter().map(|i| i.compute(bars)).collect();

        let rows = (0..bars.len())
            .map(|i| {
                let snap = IndicatorSnapshot {
                    sma: series[0][i],
                    std: series[1][i],
                    bb_upper: series[2][i],
                    bb_lower: series[3][i],
                    rsi: series[4][i],
                    ma_fast: series[5][i],
                    ma_slow: series[6][i],
                    trend_strength: series[7][i],
                    atr: series[8][i],
                };
                snap.is_defined().then_some(snap)
            })
            .collect();

        Self { rows, lookback }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Leading bars that can never be defined with these windows.
    pub fn lookback(&self) -> usize {
        self.lookback
    }

    /// Indicator values at a bar, `None` when any value is undefined.
    pub fn get(&self, index: usize) -> Option<&IndicatorSnapshot> {
        self.rows.get(index).and_then(Option::as_ref)
    }

    /// Rows usable by the simulation, in bar order.
    pub fn ready_rows(&self, bars: &[Bar]) -> Vec<ReadyRow> {
        bars.iter()
            .zip(&self.rows)
            .enumerate()
            .filter_map(|(index, (bar, snap))| {
                snap.map(|ind| ReadyRow {
                    index,
                    bar: bar.clone(),
                    ind,
                })
            })
            .collect()
    }
}

// ─── Window scans ───

/// Rolling mean over `window` values; NaN until full or when the window holds a NaN.
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    let n = values.len();
    let mut out = vec![f64::NAN; n];
    if window == 0 || n < window {
        return out;
    }
    for end in (window - 1)..n {
        let slice = &values[end + 1 - window..=end];
        if slice.iter().all(|v| v.is_finite()) {
            out[end] = slice.iter().sum::<f64>() / window as f64;
        }
    }
    out
}

/// Rolling standard deviation with `ddof` delta degrees of freedom.
pub fn rolling_std(values: &[f64], window: usize, ddof: usize) -> Vec<f64> {
    let n = values.len();
    let mut out = vec![f64::NAN; n];
    if window == 0 || window <= ddof || n < window {
        return out;
    }
    for end in (window - 1)..n {
        let slice = &values[end + 1 - window..=end];
        if !slice.iter().all(|v| v.is_finite()) {
            continue;
        }
        let mean = slice.iter().sum::<f64>() / window as f64;
        let ss: f64 = slice.iter().map(|v| (v - mean) * (v - mean)).sum();
        out[end] = (ss / (window - ddof) as f64).sqrt();
    }
    out
}

/// Percent change against the value `periods` rows earlier.
pub fn pct_change(values: &[f64], periods: usize) -> Vec<f64> {
    (0..values.len())
        .map(|i| {
            if i < periods {
                f64::NAN
            } else {
                values[i] / values[i - periods] - 1.0
            }
        })
        .collect()
}

/// Create synthetic bars from close prices for testing.
///
/// open = prev_close (or close for the first bar), high = max(open,close) + 1,
/// low = min(open,close) - 1, hourly timestamps.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar::from_millis(
                1_700_000_000_000 + i as i64 * 3_600_000,
                open,
                open.max(close) + 1.0,
                open.min(close) - 1.0,
                close,
                1000.0,
            )
            .unwrap()
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> IndicatorParams {
        IndicatorParams {
            bb_window: 5,
            bb_std: 2.0,
            rsi_period: 4,
            momentum_fast: 3,
            momentum_slow: 8,
            atr_window: 4,
        }
    }

    fn zigzag(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0 + i as f64 * 0.1)
            .collect()
    }

    #[test]
    fn frame_is_aligned_with_bars() {
        let bars = make_bars(&zigzag(40));
        let frame = IndicatorFrame::compute(&bars, &params());
        assert_eq!(frame.len(), 40);
        assert_eq!(frame.lookback(), 7);
        for i in 0..7 {
            assert!(frame.get(i).is_none(), "row {i} should be undefined");
        }
        assert!(frame.get(7).is_some());
    }

    #[test]
    fn ready_rows_carry_source_index() {
        let bars = make_bars(&zigzag(40));
        let frame = IndicatorFrame::compute(&bars, &params());
        let rows = frame.ready_rows(&bars);
        assert_eq!(rows.first().map(|r| r.index), Some(7));
        assert!(rows.iter().all(|r| r.ind.is_defined()));
        assert!(rows.windows(2).all(|w| w[0].index < w[1].index));
    }

    #[test]
    fn zero_loss_window_is_dropped() {
        // Strictly rising closes: no losses, oscillator undefined everywhere
        let closes: Vec<f64> = (0..30).map(|i| 100.0 + i as f64).collect();
        let bars = make_bars(&closes);
        let frame = IndicatorFrame::compute(&bars, &params());
        assert!(frame.ready_rows(&bars).is_empty());
    }

    #[test]
    fn rolling_mean_skips_windows_with_nan() {
        let out = rolling_mean(&[1.0, 2.0, f64::NAN, 4.0, 5.0, 6.0], 2);
        assert!(out[0].is_nan());
        assert_approx(out[1], 1.5, DEFAULT_EPSILON);
        assert!(out[2].is_nan());
        assert!(out[3].is_nan());
        assert_approx(out[4], 4.5, DEFAULT_EPSILON);
    }

    #[test]
    fn rolling_std_population_and_sample() {
        let values = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        let pop = rolling_std(&values, 8, 0);
        assert_approx(pop[7], 2.0, DEFAULT_EPSILON);
        let sample = rolling_std(&values, 8, 1);
        assert_approx(sample[7], (32.0f64 / 7.0).sqrt(), DEFAULT_EPSILON);
    }

    #[test]
    fn pct_change_periods() {
        let out = pct_change(&[100.0, 110.0, 121.0], 1);
        assert!(out[0].is_nan());
        assert_approx(out[1], 0.1, 1e-12);
        assert_approx(out[2], 0.1, 1e-12);
        let two = pct_change(&[100.0, 110.0, 121.0], 2);
        assert_approx(two[2], 0.21, 1e-12);
    }
}
