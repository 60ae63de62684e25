//! Error taxonomy for runs that cannot start.
//!
//! Input and config errors abort before the state machine is created.
//! Overlay degradation and risk events are not errors and never appear here.

use std::path::PathBuf;
use thiserror::Error;

/// Missing, malformed, or insufficient market data.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum InputError {
    #[error("Data file not found: {}", path.display())]
    DataFileNotFound { path: PathBuf },

    #[error("Missing required columns in CSV: {}", columns.join(", "))]
    MissingColumns { columns: Vec<String> },

    #[error("{message}")]
    InsufficientRows { message: String, rows: usize },

    #[error("No overlapping timestamps between primary and secondary datasets; try matching ranges and timeframe.")]
    EmptyPairOverlap,
}

impl InputError {
    pub fn insufficient(message: impl Into<String>, rows: usize) -> Self {
        InputError::InsufficientRows {
            message: message.into(),
            rows,
        }
    }

    /// Observed row count, for failures caused by too little data.
    pub fn rows(&self) -> Option<usize> {
        match self {
            InputError::InsufficientRows { rows, .. } => Some(*rows),
            _ => None,
        }
    }
}

/// Configuration that cannot produce a run.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("stat-arb requires secondary data (--secondary-data-csv)")]
    StatArbRequiresSecondary,

    #[error("Secondary data file not found: {}", path.display())]
    SecondaryFileNotFound { path: PathBuf },

    #[error("unknown strategy mode '{0}'")]
    UnknownStrategyMode(String),

    #[error("unknown model type '{0}' (expected random_forest, xgboost or logistic)")]
    UnknownModelKind(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_columns_message_lists_columns() {
        let err = InputError::MissingColumns {
            columns: vec!["close".into(), "volume".into()],
        };
        assert_eq!(err.to_string(), "Missing required columns in CSV: close, volume");
    }

    #[test]
    fn stat_arb_message_names_secondary_data() {
        let msg = ConfigError::StatArbRequiresSecondary.to_string();
        assert!(msg.contains("stat-arb requires secondary data"));
    }

    #[test]
    fn insufficient_rows_carries_count() {
        let err = InputError::insufficient("Not enough data to run backtest.", 12);
        assert_eq!(err.rows(), Some(12));
        assert_eq!(err.to_string(), "Not enough data to run backtest.");
    }
}
