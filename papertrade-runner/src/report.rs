//! JSON report payloads returned to the caller.
//!
//! A run yields either a [`RunReport`] (`success: true`) or a
//! [`FailureReport`] (`success: false`). Both serialize to the flat JSON
//! object the CLI prints.

use crate::metrics::PerformanceMetrics;
use papertrade_core::domain::{ConfigHash, DatasetHash, RiskControls, RiskEvent, Trade};
use papertrade_core::StrategyConfig;
use serde::Serialize;
use std::path::PathBuf;

/// Pair metadata, present only in stat-arb runs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatArbMetadata {
    pub enabled: bool,
    pub primary_csv: PathBuf,
    pub secondary_csv: Option<PathBuf>,
    pub pair_symbol: Option<String>,
    pub statarb_window: usize,
    pub statarb_z_entry: f64,
    pub statarb_z_exit: f64,
    pub statarb_z_stop: f64,
    /// Hedge ratio on the last indicator-ready row.
    pub hedge_ratio: Option<f64>,
}

/// Everything under `metrics` in the report.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunMetrics {
    #[serde(flatten)]
    pub performance: PerformanceMetrics,
    pub drawdown_halt: bool,
    pub halt_reason: Option<String>,
    pub bars: usize,
    pub risk_controls: RiskControls,
    pub risk_events: Vec<RiskEvent>,

    pub ml_enabled: bool,
    pub ml_model_type: String,
    pub ml_horizon: usize,
    pub ml_train_ratio: f64,
    pub ml_confidence: f64,
    pub ml_model_fit: String,
    pub ml_accuracy: f64,
    pub ml_train_rows: usize,
    pub ml_test_rows: usize,
    pub ml_eval_rows: usize,
    pub ml_sentiment_threshold: f64,

    pub strategy_mode: String,
    pub strategy_regime_enabled: bool,
    pub max_portfolio_risk: f64,
    pub statarb: Option<StatArbMetadata>,

    pub config: StrategyConfig,
    pub config_hash: ConfigHash,
    pub dataset_hash: DatasetHash,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trades_csv: Option<PathBuf>,
}

/// Closing snapshot of the run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Signals {
    /// `none` when no trade was written, else the final position state.
    pub position: String,
    pub last_price: f64,
    pub last_timestamp: String,
    pub last_ml_prob: f64,
    pub last_sentiment: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub success: bool,
    pub mode: String,
    pub mode_description: String,
    pub halted: bool,
    pub halt_reason: Option<String>,
    pub signals: Signals,
    pub metrics: RunMetrics,
    pub trades: Vec<Trade>,
}

/// Structured failure: which precondition failed and, when relevant, the
/// observed row count.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailureReport {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows: Option<usize>,
}

impl FailureReport {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
            details: None,
            rows: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_rows(mut self, rows: usize) -> Self {
        self.rows = Some(rows);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_omits_empty_fields() {
        let json = serde_json::to_value(FailureReport::new("boom")).unwrap();
        assert_eq!(json, serde_json::json!({"success": false, "error": "boom"}));
    }

    #[test]
    fn failure_carries_rows_and_details() {
        let report = FailureReport::new("Not enough data to run backtest.")
            .with_rows(12)
            .with_details("after cleaning");
        let json = serde_json::to_value(report).unwrap();
        assert_eq!(json["rows"], 12);
        assert_eq!(json["details"], "after cleaning");
    }
}
