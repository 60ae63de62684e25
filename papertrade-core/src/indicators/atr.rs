//! Average True Range (ATR).
//!
//! True range = max(high - low, |high - prev_close|, |low - prev_close|); the
//! first bar has no previous close and uses high - low. ATR is the simple
//! rolling mean of true range over `period` bars.
//! Lookback: period - 1.

use super::{rolling_mean, Indicator};
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Atr {
    period: usize,
    name: String,
}

impl Atr {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "ATR period must be >= 1");
        Self {
            period,
            name: format!("atr_{period}"),
        }
    }
}

/// Per-bar true range.
pub fn true_range(bars: &[Bar]) -> Vec<f64> {
    bars.iter()
        .enumerate()
        .map(|(i, bar)| {
            let hl = bar.high - bar.low;
            if i == 0 {
                return hl;
            }
            let prev_close = bars[i - 1].close;
            hl.max((bar.high - prev_close).abs())
                .max((bar.low - prev_close).abs())
        })
        .collect()
}

impl Indicator for Atr {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        rolling_mean(&true_range(bars), self.period)
    }
}
