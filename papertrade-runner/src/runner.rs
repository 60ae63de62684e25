//! Single-run orchestration: load → validate → overlays → simulate → report.
//!
//! Every precondition is checked before the state machine is created, so a
//! failed run never leaves partial state behind. [`run_report`] is the outer
//! boundary that turns any [`RunError`] into a [`FailureReport`].

use crate::config::RunConfig;
use crate::data_loader::{load_bars_csv, load_sentiment_csv, LoadError};
use crate::export::{write_trades_csv, ExportError};
use crate::metrics::PerformanceMetrics;
use crate::report::{FailureReport, RunMetrics, RunReport, Signals, StatArbMetadata};
use chrono::{DateTime, Utc};
use papertrade_core::classifier::{BuiltinClassifiers, ClassifierFactory};
use papertrade_core::domain::{Bar, DatasetHash};
use papertrade_core::engine::{run_simulation, SimulationInput};
use papertrade_core::error::{ConfigError, InputError};
use papertrade_core::indicators::{IndicatorFrame, ReadyRow};
use papertrade_core::overlay::{estimate_probabilities, neutral_sentiment, NEUTRAL_PROBABILITY};
use papertrade_core::spread::build_pair_spread;
use papertrade_core::StrategyConfig;
use serde::Serialize;
use std::path::Path;
use thiserror::Error;

/// Cleaned primary rows needed to start a run.
pub const MIN_PRIMARY_ROWS: usize = 50;
/// Minimum joined spread rows and indicator-ready rows.
pub const MIN_READY_ROWS: usize = 30;

#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

impl RunError {
    /// The structured failure the caller sees.
    pub fn to_failure(&self) -> FailureReport {
        match self {
            RunError::Input(e) | RunError::Load(LoadError::Input(e)) => {
                let report = FailureReport::new(e.to_string());
                match e.rows() {
                    Some(rows) => report.with_rows(rows),
                    None => report,
                }
            }
            RunError::Load(e) => FailureReport::new("Failed to load input data").with_details(e.to_string()),
            RunError::Export(e) => FailureReport::new("Failed to write trade ledger").with_details(e.to_string()),
            RunError::Config(e) => FailureReport::new(e.to_string()),
        }
    }
}

/// Bars the engine runs on, plus stat-arb bookkeeping.
struct PreparedSeries {
    bars: Vec<Bar>,
    hedge_ratios: Option<Vec<f64>>,
    secondary_csv: Option<std::path::PathBuf>,
}

fn prepare_series(config: &RunConfig, strategy: &StrategyConfig, primary: Vec<Bar>) -> Result<PreparedSeries, RunError> {
    if !strategy.strategy_mode.is_stat_arb() {
        return Ok(PreparedSeries {
            bars: primary,
            hedge_ratios: None,
            secondary_csv: None,
        });
    }

    let secondary_path = config
        .data
        .secondary_data_csv
        .as_ref()
        .ok_or(ConfigError::StatArbRequiresSecondary)?;
    if !secondary_path.exists() {
        return Err(ConfigError::SecondaryFileNotFound {
            path: secondary_path.clone(),
        }
        .into());
    }
    let secondary = load_bars_csv(secondary_path)?.bars;
    if secondary.len() < MIN_READY_ROWS.max(strategy.statarb_window) {
        return Err(InputError::insufficient(
            "Not enough data in secondary dataset for stat-arb.",
            secondary.len(),
        )
        .into());
    }

    let spread = build_pair_spread(&primary, &secondary, strategy.pair_label(), strategy.statarb_window)?;
    if spread.len() < MIN_READY_ROWS {
        return Err(InputError::insufficient(
            "Not enough overlapping rows after building stat-arb spread.",
            spread.len(),
        )
        .into());
    }
    tracing::info!(
        pair = strategy.pair_label(),
        rows = spread.len(),
        shift = spread.shift,
        hedge_ratio = spread.rows.last().map(|r| r.hedge_ratio),
        "stat-arb spread built"
    );
    Ok(PreparedSeries {
        bars: spread.bars(),
        hedge_ratios: Some(spread.rows.iter().map(|r| r.hedge_ratio).collect()),
        secondary_csv: Some(secondary_path.clone()),
    })
}

fn sentiment_for(config: &RunConfig, strategy: &StrategyConfig, rows: &[ReadyRow]) -> Vec<f64> {
    let Some(path) = config.data.sentiment_csv.as_deref() else {
        return neutral_sentiment(rows.len());
    };
    match load_sentiment_csv(path) {
        Ok(Some(overlay)) => {
            let timeline: Vec<DateTime<Utc>> = rows.iter().map(|r| r.bar.timestamp).collect();
            overlay.align(&timeline, strategy.sentiment.weight)
        }
        Ok(None) => neutral_sentiment(rows.len()),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "sentiment unavailable, using neutral");
            neutral_sentiment(rows.len())
        }
    }
}

/// Run one simulation with the built-in classifiers.
pub fn run_paper(config: &RunConfig) -> Result<RunReport, RunError> {
    run_paper_with(config, &BuiltinClassifiers)
}

/// Run one simulation with a caller-supplied classifier factory.
pub fn run_paper_with(config: &RunConfig, classifiers: &dyn ClassifierFactory) -> Result<RunReport, RunError> {
    let strategy = config.effective_strategy();
    let data_path: &Path = &config.data.data_csv;

    // ─── Preconditions ───
    let primary = load_bars_csv(data_path)?.bars;
    if primary.len() < MIN_PRIMARY_ROWS {
        return Err(InputError::insufficient("Not enough data to run backtest.", primary.len()).into());
    }
    let series = prepare_series(config, &strategy, primary)?;

    let frame = IndicatorFrame::compute(&series.bars, &strategy.indicator_params());
    let rows = frame.ready_rows(&series.bars);
    let hedge_ratio = match (&series.hedge_ratios, rows.last()) {
        (Some(ratios), Some(last)) => ratios.get(last.index).copied(),
        _ => None,
    };
    if rows.len() < MIN_READY_ROWS {
        return Err(InputError::insufficient(
            "Not enough indicator-ready rows for indicators with configured window.",
            rows.len(),
        )
        .into());
    }

    // ─── Overlays ───
    let sentiment = sentiment_for(config, &strategy, &rows);
    let ml = estimate_probabilities(&rows, &sentiment, &strategy.ml, classifiers);

    // ─── Simulation ───
    let outcome = run_simulation(
        &strategy,
        SimulationInput {
            rows: &rows,
            probability: &ml.probability,
            sentiment: &sentiment,
        },
    );

    let trades_csv = match config.data.trades_csv.as_deref() {
        Some(path) => {
            write_trades_csv(path, &outcome.trades)?;
            Some(path.to_path_buf())
        }
        None => None,
    };

    // ─── Report ───
    let performance = PerformanceMetrics::compute(
        outcome.initial_cash,
        outcome.final_cash,
        &outcome.equity_curve,
        &outcome.trades,
        &strategy.timeframe,
    );
    let statarb = strategy.strategy_mode.is_stat_arb().then(|| StatArbMetadata {
        enabled: true,
        primary_csv: data_path.to_path_buf(),
        secondary_csv: series.secondary_csv.clone(),
        pair_symbol: strategy.pair_symbol.clone(),
        statarb_window: strategy.statarb_window,
        statarb_z_entry: strategy.statarb_z_entry,
        statarb_z_exit: strategy.statarb_z_exit,
        statarb_z_stop: strategy.statarb_z_stop,
        hedge_ratio,
    });

    let last = &rows[rows.len() - 1];
    let signals = Signals {
        position: if outcome.trades.is_empty() {
            "none".to_string()
        } else {
            outcome.position_state.as_str().to_string()
        },
        last_price: last.bar.close,
        last_timestamp: last.bar.timestamp.to_rfc3339(),
        last_ml_prob: if strategy.ml.enabled {
            ml.probability.last().copied().unwrap_or(NEUTRAL_PROBABILITY)
        } else {
            NEUTRAL_PROBABILITY
        },
        last_sentiment: sentiment.last().copied().unwrap_or(0.0),
    };

    let round6 = |v: f64| papertrade_core::domain::round_to(v, 6);
    let metrics = RunMetrics {
        performance,
        drawdown_halt: outcome.halted,
        halt_reason: outcome.halt_reason.clone(),
        bars: outcome.bars,
        risk_controls: outcome.risk_controls.clone(),
        risk_events: outcome.risk_events.clone(),
        ml_enabled: strategy.ml.enabled,
        ml_model_type: if strategy.ml.enabled {
            strategy.ml.model_type.as_str().to_string()
        } else {
            "disabled".to_string()
        },
        ml_horizon: strategy.ml.horizon,
        ml_train_ratio: round6(strategy.ml.train_ratio),
        ml_confidence: round6(strategy.ml.confidence),
        ml_model_fit: ml.report.model_fit.as_str().to_string(),
        ml_accuracy: ml.report.accuracy,
        ml_train_rows: ml.report.train_rows,
        ml_test_rows: ml.report.test_rows,
        ml_eval_rows: ml.report.eval_rows,
        ml_sentiment_threshold: round6(strategy.sentiment.threshold),
        strategy_mode: strategy.strategy_mode.as_str().to_string(),
        strategy_regime_enabled: strategy.use_regime,
        max_portfolio_risk: round6(strategy.max_portfolio_risk),
        statarb,
        config_hash: strategy.config_hash(),
        dataset_hash: DatasetHash::of_bars(&series.bars),
        config: strategy.clone(),
        trades_csv,
    };

    tracing::info!(
        mode = config.mode.as_str(),
        bars = metrics.bars,
        trades = outcome.trades.len(),
        total_return = metrics.performance.total_return,
        halted = outcome.halted,
        "run complete"
    );

    Ok(RunReport {
        success: true,
        mode: config.mode.as_str().to_string(),
        mode_description: config.mode.description().to_string(),
        halted: outcome.halted,
        halt_reason: outcome.halt_reason,
        signals,
        metrics,
        trades: outcome.trades,
    })
}

/// Either payload, serialized as one flat JSON object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RunResponse {
    Success(Box<RunReport>),
    Failure(FailureReport),
}

impl RunResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, RunResponse::Success(_))
    }
}

/// Outer boundary: never fails, failures become a [`FailureReport`].
pub fn run_report(config: &RunConfig) -> RunResponse {
    match run_paper(config) {
        Ok(report) => RunResponse::Success(Box::new(report)),
        Err(e) => {
            tracing::warn!(error = %e, "run failed");
            RunResponse::Failure(e.to_failure())
        }
    }
}
