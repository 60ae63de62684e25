//! Bollinger bands and the population standard deviation behind them.
//!
//! Band = SMA(period) ± multiplier × population std-dev(period).
//! Each band is a separate indicator instance.

use super::{rolling_mean, rolling_std, Indicator};
use crate::domain::Bar;

/// Population (ddof = 0) standard deviation of closes.
#[derive(Debug, Clone)]
pub struct StdDev {
    period: usize,
    name: String,
}

impl StdDev {
    pub fn new(period: usize) -> Self {
        assert!(period >= 1, "StdDev period must be >= 1");
        Self {
            period,
            name: format!("std_{period}"),
        }
    }
}

impl Indicator for StdDev {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        rolling_std(&closes, self.period, 0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BollingerBand {
    Upper,
    Lower,
}

#[derive(Debug, Clone)]
pub struct Bollinger {
    period: usize,
    multiplier: f64,
    band: BollingerBand,
    name: String,
}

impl Bollinger {
    pub fn new(period: usize, multiplier: f64, band: BollingerBand) -> Self {
        assert!(period >= 1, "Bollinger period must be >= 1");
        let tag = match band {
            BollingerBand::Upper => "upper",
            BollingerBand::Lower => "lower",
        };
        Self {
            period,
            multiplier,
            band,
            name: format!("bb_{tag}_{period}_{multiplier}"),
        }
    }
}

impl Indicator for Bollinger {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period.saturating_sub(1)
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let mean = rolling_mean(&closes, self.period);
        let std = rolling_std(&closes, self.period, 0);
        let sign = match self.band {
            BollingerBand::Upper => 1.0,
            BollingerBand::Lower => -1.0,
        };
        mean.iter()
            .zip(&std)
            .map(|(m, s)| m + sign * self.multiplier * s)
            .collect()
    }
}
