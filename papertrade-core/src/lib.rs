//! Papertrade Core: deterministic backtest and paper-simulation engine.
//!
//! This crate holds everything that runs between "bars are loaded" and
//! "outcome is ready for metrics":
//! - Domain types (bars, trade ledger rows, risk events)
//! - Validated `StrategyConfig` with defaults and clamps applied once
//! - Indicator Engine and the stat-arb Pair-Spread Builder
//! - Sentiment and probability overlays with seeded built-in classifiers
//! - The per-bar Strategy/Risk State Machine
//! - Collaborator traits for OHLCV sources and live order executors
//!
//! Nothing here touches the filesystem or the network.

pub mod broker;
pub mod classifier;
pub mod config;
pub mod data;
pub mod domain;
pub mod engine;
pub mod error;
pub mod indicators;
pub mod overlay;
pub mod rng;
pub mod spread;

pub use config::{MlConfig, ModelKind, SentimentConfig, StrategyConfig, StrategyMode};
pub use error::{ConfigError, InputError};
