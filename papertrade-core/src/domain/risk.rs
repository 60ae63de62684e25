//! Risk events and risk-control counters.
//!
//! Risk events are not errors: the run continues (possibly halted) and the
//! events are carried verbatim into the report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Why a stat-arb entry was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryBlockReason {
    InvalidSpreadPrice,
}

/// Record emitted whenever a risk control fires.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RiskEvent {
    DrawdownCircuitBreaker {
        timestamp: DateTime<Utc>,
        equity: f64,
        drawdown: f64,
    },
    StrategyCorrelationBlock {
        timestamp: DateTime<Utc>,
        correlation: f64,
        cap: f64,
    },
    StatarbEntryBlock {
        timestamp: DateTime<Utc>,
        reason: EntryBlockReason,
        price: Option<f64>,
    },
}

impl RiskEvent {
    /// The `type` tag as it appears in the report.
    pub fn kind(&self) -> &'static str {
        match self {
            RiskEvent::DrawdownCircuitBreaker { .. } => "drawdown_circuit_breaker",
            RiskEvent::StrategyCorrelationBlock { .. } => "strategy_correlation_block",
            RiskEvent::StatarbEntryBlock { .. } => "statarb_entry_block",
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            RiskEvent::DrawdownCircuitBreaker { timestamp, .. }
            | RiskEvent::StrategyCorrelationBlock { timestamp, .. }
            | RiskEvent::StatarbEntryBlock { timestamp, .. } => *timestamp,
        }
    }
}

/// Counters and levels of the drawdown circuit and the correlation guard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskControls {
    pub drawdown_circuit_enabled: bool,
    pub drawdown_circuit_level: f64,
    pub drawdown_circuit_hits: u32,
    pub strategy_correlation_cap: f64,
    pub strategy_correlation_window: usize,
    pub strategy_correlation_hits: u32,
    pub max_strategy_correlation_abs: f64,
}

impl RiskControls {
    pub fn new(max_drawdown: f64, correlation_cap: f64, correlation_window: usize) -> Self {
        Self {
            drawdown_circuit_enabled: max_drawdown > 0.0,
            drawdown_circuit_level: max_drawdown,
            drawdown_circuit_hits: 0,
            strategy_correlation_cap: correlation_cap,
            strategy_correlation_window: correlation_window,
            strategy_correlation_hits: 0,
            max_strategy_correlation_abs: 0.0,
        }
    }
}
