//! Strategy configuration.
//!
//! `StrategyConfig` is deserialized (TOML, JSON, or CLI overrides) with every
//! field defaulted, then normalized once with [`StrategyConfig::normalized`]
//! before any indicator or simulation work starts. Nothing downstream clamps
//! again.

use crate::domain::ConfigHash;
use crate::error::ConfigError;
use crate::indicators::IndicatorParams;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which rule set drives entries and exits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case", from = "String")]
pub enum StrategyMode {
    #[default]
    Adaptive,
    MeanReversion,
    Momentum,
    MomentumOnly,
    StatArb,
}

impl StrategyMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyMode::Adaptive => "adaptive",
            StrategyMode::MeanReversion => "mean-reversion",
            StrategyMode::Momentum => "momentum",
            StrategyMode::MomentumOnly => "momentum-only",
            StrategyMode::StatArb => "stat-arb",
        }
    }

    pub fn is_stat_arb(&self) -> bool {
        matches!(self, StrategyMode::StatArb)
    }
}

impl fmt::Display for StrategyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "adaptive" => Ok(StrategyMode::Adaptive),
            "mean-reversion" => Ok(StrategyMode::MeanReversion),
            "momentum" => Ok(StrategyMode::Momentum),
            "momentum-only" => Ok(StrategyMode::MomentumOnly),
            "stat-arb" => Ok(StrategyMode::StatArb),
            other => Err(ConfigError::UnknownStrategyMode(other.to_string())),
        }
    }
}

/// Config files fall back to `adaptive` for unrecognised modes.
impl From<String> for StrategyMode {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            tracing::warn!(mode = %value, "unknown strategy mode, using adaptive");
            StrategyMode::Adaptive
        })
    }
}

/// Classifier family for the probability overlay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    #[default]
    RandomForest,
    Xgboost,
    Logistic,
}

impl ModelKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelKind::RandomForest => "random_forest",
            ModelKind::Xgboost => "xgboost",
            ModelKind::Logistic => "logistic",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "random_forest" => Ok(ModelKind::RandomForest),
            "xgboost" => Ok(ModelKind::Xgboost),
            "logistic" => Ok(ModelKind::Logistic),
            other => Err(ConfigError::UnknownModelKind(other.to_string())),
        }
    }
}

/// Probability overlay settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MlConfig {
    pub enabled: bool,
    pub model_type: ModelKind,
    /// Bars ahead used for the up/down label.
    pub horizon: usize,
    pub train_ratio: f64,
    pub confidence: f64,
}

impl Default for MlConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model_type: ModelKind::RandomForest,
            horizon: 4,
            train_ratio: 0.70,
            confidence: 0.55,
        }
    }
}

/// Sentiment overlay settings. The source file itself is a run input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentimentConfig {
    pub weight: f64,
    pub threshold: f64,
}

impl Default for SentimentConfig {
    fn default() -> Self {
        Self {
            weight: 1.0,
            threshold: 0.0,
        }
    }
}

/// Every tunable of a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyConfig {
    pub strategy_mode: StrategyMode,
    pub initial_cash: f64,
    /// Fraction of cash requested per entry, in (0, 1].
    pub position_size: f64,
    pub bb_window: usize,
    pub bb_std: f64,
    pub rsi_period: usize,
    pub rsi_buy: f64,
    pub rsi_sell: f64,
    pub momentum_fast: usize,
    pub momentum_slow: usize,
    pub trend_threshold: f64,
    pub use_regime: bool,
    /// Upper bound on the fraction of cash any single entry may allocate.
    pub max_portfolio_risk: f64,
    pub fee_rate: f64,
    pub atr_window: usize,
    pub stop_atr_mult: f64,
    pub strategy_correlation_cap: f64,
    pub strategy_correlation_window: usize,
    /// Hedge-ratio window for the pair spread.
    pub statarb_window: usize,
    pub statarb_z_entry: f64,
    pub statarb_z_exit: f64,
    pub statarb_z_stop: f64,
    pub pair_symbol: Option<String>,
    pub max_drawdown: f64,
    /// Nominal bar timeframe, used only for Sharpe annualization.
    pub timeframe: String,
    pub ml: MlConfig,
    pub sentiment: SentimentConfig,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            strategy_mode: StrategyMode::Adaptive,
            initial_cash: 10_000.0,
            position_size: 0.02,
            bb_window: 20,
            bb_std: 2.0,
            rsi_period: 14,
            rsi_buy: 30.0,
            rsi_sell: 70.0,
            momentum_fast: 50,
            momentum_slow: 200,
            trend_threshold: 0.0025,
            use_regime: true,
            max_portfolio_risk: 0.05,
            fee_rate: 0.0004,
            atr_window: 14,
            stop_atr_mult: 2.0,
            strategy_correlation_cap: 0.70,
            strategy_correlation_window: 120,
            statarb_window: 100,
            statarb_z_entry: 2.0,
            statarb_z_exit: 0.0,
            statarb_z_stop: 3.5,
            pair_symbol: None,
            max_drawdown: 0.10,
            timeframe: "1h".to_string(),
            ml: MlConfig::default(),
            sentiment: SentimentConfig::default(),
        }
    }
}

pub const DEFAULT_PAIR_SYMBOL: &str = "PAIR2";

fn finite_or(value: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        fallback
    }
}

impl StrategyConfig {
    /// Apply every clamp and fallback. Idempotent.
    pub fn normalized(mut self) -> Self {
        let d = StrategyConfig::default();

        self.bb_window = self.bb_window.max(2);
        self.rsi_period = self.rsi_period.max(2);
        self.atr_window = self.atr_window.max(2);
        self.momentum_fast = self.momentum_fast.max(2);
        self.momentum_slow = self.momentum_slow.max(2);
        if self.momentum_fast >= self.momentum_slow {
            self.momentum_fast = self.momentum_slow.saturating_sub(1).max(2);
        }
        self.strategy_correlation_window = self.strategy_correlation_window.max(20);
        self.statarb_window = self.statarb_window.max(20);
        self.ml.horizon = self.ml.horizon.max(1);

        self.bb_std = finite_or(self.bb_std, d.bb_std);
        self.rsi_buy = finite_or(self.rsi_buy, d.rsi_buy);
        self.rsi_sell = finite_or(self.rsi_sell, d.rsi_sell);
        self.trend_threshold = finite_or(self.trend_threshold, d.trend_threshold).max(0.0001);
        self.max_portfolio_risk =
            finite_or(self.max_portfolio_risk, d.max_portfolio_risk).clamp(0.0, 1.0);
        self.fee_rate = finite_or(self.fee_rate, d.fee_rate);
        self.stop_atr_mult = finite_or(self.stop_atr_mult, d.stop_atr_mult);
        self.strategy_correlation_cap =
            finite_or(self.strategy_correlation_cap, d.strategy_correlation_cap);
        self.statarb_z_entry = finite_or(self.statarb_z_entry, d.statarb_z_entry);
        self.statarb_z_exit = finite_or(self.statarb_z_exit, d.statarb_z_exit).abs();
        self.statarb_z_stop = finite_or(self.statarb_z_stop, d.statarb_z_stop).abs();
        self.max_drawdown = finite_or(self.max_drawdown, d.max_drawdown);
        self.initial_cash = finite_or(self.initial_cash, d.initial_cash).max(1e-9);

        let size = finite_or(self.position_size, d.position_size);
        self.position_size = if size <= 0.0 {
            0.01
        } else if size > 1.0 {
            1.0
        } else {
            size
        };

        self.ml.train_ratio = finite_or(self.ml.train_ratio, d.ml.train_ratio);
        self.ml.confidence = finite_or(self.ml.confidence, d.ml.confidence);
        self.sentiment.weight = finite_or(self.sentiment.weight, d.sentiment.weight);
        self.sentiment.threshold = finite_or(self.sentiment.threshold, d.sentiment.threshold);

        if self.pair_symbol.as_deref().map(str::trim) == Some("") {
            self.pair_symbol = None;
        }
        self
    }

    pub fn indicator_params(&self) -> IndicatorParams {
        IndicatorParams {
            bb_window: self.bb_window,
            bb_std: self.bb_std,
            rsi_period: self.rsi_period,
            momentum_fast: self.momentum_fast,
            momentum_slow: self.momentum_slow,
            atr_window: self.atr_window,
        }
    }

    /// Label of the secondary leg in stat-arb mode.
    pub fn pair_label(&self) -> &str {
        self.pair_symbol.as_deref().unwrap_or(DEFAULT_PAIR_SYMBOL)
    }

    /// BLAKE3 of the canonical JSON form (field order is declaration order).
    pub fn config_hash(&self) -> ConfigHash {
        let canonical = serde_json::to_vec(self).unwrap_or_default();
        ConfigHash::from_bytes(&canonical)
    }
}
