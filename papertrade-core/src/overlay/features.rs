//! Feature matrix for the probability overlay.
//!
//! One row per indicator-ready bar. Returns and volatilities are computed over
//! the ready-row sequence, so warm-up rows never leak in. Rows with any
//! non-finite feature are dropped and the surviving rows remember their
//! position in the input.

use crate::indicators::{pct_change, rolling_std, ReadyRow};

pub const FEATURE_NAMES: [&str; 13] = [
    "ret_1",
    "ret_3",
    "ret_8",
    "vol_8",
    "vol_24",
    "rsi",
    "rsi_below_30",
    "bb_width",
    "ma_spread",
    "trend_strength",
    "atr_pct",
    "volume_change",
    "sentiment",
];

/// Oversold flag level, independent of the configured buy threshold.
const OVERSOLD_LEVEL: f64 = 30.0;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureMatrix {
    /// Index into the ready rows for each feature row.
    pub positions: Vec<usize>,
    pub values: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn nonzero_or_one(v: f64) -> f64 {
    if v == 0.0 {
        1.0
    } else {
        v
    }
}

/// Build features from ready rows and a bar-aligned sentiment series.
///
/// A missing sentiment value counts as 0.
pub fn build_features(rows: &[ReadyRow], sentiment: &[f64]) -> FeatureMatrix {
    let close: Vec<f64> = rows.iter().map(|r| r.bar.close).collect();
    let volume: Vec<f64> = rows.iter().map(|r| r.bar.volume).collect();

    let ret_1 = pct_change(&close, 1);
    let ret_3 = pct_change(&close, 3);
    let ret_8 = pct_change(&close, 8);
    let vol_8 = rolling_std(&ret_1, 8, 1);
    let vol_24 = rolling_std(&ret_1, 24, 1);
    let volume_change = pct_change(&volume, 1);

    let mut matrix = FeatureMatrix::default();
    for (i, row) in rows.iter().enumerate() {
        let ind = &row.ind;
        let ma_spread = ind.ma_fast - ind.ma_slow;
        let values = vec![
            ret_1[i],
            ret_3[i],
            ret_8[i],
            vol_8[i],
            vol_24[i],
            ind.rsi,
            if ind.rsi < OVERSOLD_LEVEL { 1.0 } else { 0.0 },
            (ind.bb_upper - ind.bb_lower) / nonzero_or_one(ind.sma),
            if ma_spread.is_infinite() { 0.0 } else { ma_spread },
            ind.trend_strength,
            ind.atr / nonzero_or_one(row.bar.close),
            volume_change[i],
            sentiment.get(i).copied().filter(|s| !s.is_nan()).unwrap_or(0.0),
        ];
        if values.iter().all(|v| v.is_finite()) {
            matrix.positions.push(i);
            matrix.values.push(values);
        }
    }
    matrix
}
