//! Papertrade Runner: run orchestration on top of `papertrade-core`.
//!
//! This crate provides:
//! - CSV loading for bars and sentiment, with cleaning and validation
//! - TOML run configuration and run modes
//! - Single-run orchestration with structured failure reports
//! - Performance metrics and the JSON run report
//! - Trade ledger export (CSV and JSON)
//! - Pre-trade order-risk gating
//! - Paginated OHLCV history download

pub mod config;
pub mod data_loader;
pub mod execute;
pub mod export;
pub mod fetch;
pub mod metrics;
pub mod report;
pub mod runner;

pub use config::{DataConfig, RunConfig, RunMode};
pub use data_loader::{load_bars_csv, load_sentiment_csv, write_bars_csv, LoadError, LoadedBars};
pub use execute::{
    execute_order, CheckStatus, ExecuteRequest, ExecutionReport, ExecutionResponse, ExecutionStatus,
    RiskBlock, RiskSummary,
};
pub use export::{trades_to_csv, trades_to_json, write_trades_csv, ExportError};
pub use fetch::{fetch_history, fetch_history_since, FetchRequest, FetchSummary, FetchedHistory};
pub use metrics::PerformanceMetrics;
pub use report::{FailureReport, RunMetrics, RunReport, Signals, StatArbMetadata};
pub use runner::{run_paper, run_paper_with, run_report, RunError, RunResponse};
