//! Run configuration: input files, run mode and strategy settings.
//!
//! A `RunConfig` can be read from TOML:
//!
//! ```toml
//! mode = "paper-run"
//!
//! [data]
//! data_csv = "data/btc_1h.csv"
//! secondary_data_csv = "data/eth_1h.csv"
//!
//! [strategy]
//! strategy_mode = "stat-arb"
//! statarb_window = 120
//!
//! [strategy.ml]
//! enabled = true
//! ```
//!
//! CLI flags are applied on top of the file values.

use papertrade_core::error::ConfigError;
use papertrade_core::StrategyConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Which command produced the run. All modes share one engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RunMode {
    #[default]
    Backtest,
    PaperRun,
    PortfolioRun,
    MlRun,
}

impl RunMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunMode::Backtest => "backtest",
            RunMode::PaperRun => "paper-run",
            RunMode::PortfolioRun => "portfolio-run",
            RunMode::MlRun => "ml-run",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            RunMode::Backtest => "backtest",
            RunMode::PaperRun => "paper",
            RunMode::PortfolioRun => "portfolio-paper",
            RunMode::MlRun => "ml-paper",
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File inputs and outputs of a run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub data_csv: PathBuf,
    pub secondary_data_csv: Option<PathBuf>,
    pub sentiment_csv: Option<PathBuf>,
    pub trades_csv: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub mode: RunMode,
    pub data: DataConfig,
    pub strategy: StrategyConfig,
}

impl RunConfig {
    pub fn new(mode: RunMode, data_csv: impl Into<PathBuf>) -> Self {
        Self {
            mode,
            data: DataConfig {
                data_csv: data_csv.into(),
                ..DataConfig::default()
            },
            strategy: StrategyConfig::default(),
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        toml::from_str(text).map_err(|e| ConfigError::Invalid(e.to_string()))
    }

    pub fn from_toml_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Invalid(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Strategy settings as the engine will see them.
    ///
    /// `ml-run` always enables the probability overlay.
    pub fn effective_strategy(&self) -> StrategyConfig {
        let mut strategy = self.strategy.clone();
        if self.mode == RunMode::MlRun {
            strategy.ml.enabled = true;
        }
        strategy.normalized()
    }
}
