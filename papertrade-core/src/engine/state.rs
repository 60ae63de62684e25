//! Mutable simulation state, owned by one run and passed by reference to
//! each per-bar step.

use crate::domain::{round_to, OrderSide, OrderType, RiskControls, RiskEvent, Trade, TradeReason};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// The single open position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Position {
    /// Signed quantity; negative is short.
    pub qty: f64,
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
    pub entry_fee: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionState {
    Flat,
    Long,
    Short,
    Halted,
}

impl PositionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PositionState::Flat => "flat",
            PositionState::Long => "long",
            PositionState::Short => "short",
            PositionState::Halted => "halted",
        }
    }
}

/// Trailing history of the two raw strategy signals.
#[derive(Debug, Clone)]
pub struct SignalHistory {
    window: usize,
    mean_reversion: VecDeque<f64>,
    momentum: VecDeque<f64>,
}

impl SignalHistory {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            mean_reversion: VecDeque::with_capacity(window + 1),
            momentum: VecDeque::with_capacity(window + 1),
        }
    }

    pub fn push(&mut self, mean_reversion: f64, momentum: f64) {
        self.mean_reversion.push_back(mean_reversion);
        self.momentum.push_back(momentum);
        while self.momentum.len() > self.window {
            self.mean_reversion.pop_front();
            self.momentum.pop_front();
        }
    }

    pub fn is_full(&self) -> bool {
        self.window > 0 && self.momentum.len() >= self.window
    }

    pub fn series(&self) -> (&VecDeque<f64>, &VecDeque<f64>) {
        (&self.momentum, &self.mean_reversion)
    }
}

pub struct SimulationState {
    pub cash: f64,
    pub position: Option<Position>,
    pub peak_equity: f64,
    pub halted: bool,
    pub halt_reason: Option<String>,
    pub history: SignalHistory,
    pub equity_curve: Vec<f64>,
    pub trades: Vec<Trade>,
    pub risk_events: Vec<RiskEvent>,
    pub risk_controls: RiskControls,
    fee_rate: f64,
}

impl SimulationState {
    pub fn new(initial_cash: f64, fee_rate: f64, risk_controls: RiskControls) -> Self {
        Self {
            cash: initial_cash,
            position: None,
            peak_equity: initial_cash,
            halted: false,
            halt_reason: None,
            history: SignalHistory::new(risk_controls.strategy_correlation_window),
            equity_curve: Vec::new(),
            trades: Vec::new(),
            risk_events: Vec::new(),
            risk_controls,
            fee_rate,
        }
    }

    pub fn qty(&self) -> f64 {
        self.position.map_or(0.0, |p| p.qty)
    }

    /// Mark-to-market equity at `price`.
    pub fn equity(&self, price: f64) -> f64 {
        self.cash + self.qty() * price
    }

    pub fn position_state(&self) -> PositionState {
        if self.halted {
            return PositionState::Halted;
        }
        match self.qty() {
            q if q > 0.0 => PositionState::Long,
            q if q < 0.0 => PositionState::Short,
            _ => PositionState::Flat,
        }
    }

    /// Open a position and write its ledger row. Cash pays notional plus fee.
    pub fn open(&mut self, ts: DateTime<Utc>, price: f64, qty: f64, fee: f64, reason: TradeReason) {
        self.cash -= qty * price + fee;
        self.position = Some(Position {
            qty,
            entry_price: price,
            entry_time: ts,
            entry_fee: fee,
        });
        self.trades.push(Trade {
            side: if qty >= 0.0 { OrderSide::Buy } else { OrderSide::Sell },
            timestamp: ts,
            price: round_to(price, 8),
            qty: round_to(qty, 8),
            amount: Some(round_to(qty * price, 8)),
            pnl: None,
            pnl_pct: None,
            reason,
            order_type: OrderType::Market,
            position_open_timestamp: ts,
        });
        tracing::debug!(%ts, price, qty, reason = reason.as_str(), "position opened");
    }

    /// Close the open position, realising P&L net of both fees. No-op when flat.
    pub fn close(&mut self, ts: DateTime<Utc>, price: f64, reason: TradeReason) {
        let Some(pos) = self.position.take() else {
            return;
        };
        let proceeds = pos.qty * price;
        let fee = proceeds.abs() * self.fee_rate;
        self.cash += proceeds - fee;

        let pnl = (price - pos.entry_price) * pos.qty - pos.entry_fee - fee;
        let mut pnl_pct = if pos.entry_price > 0.0 {
            (price - pos.entry_price) / pos.entry_price
        } else {
            0.0
        };
        if pos.qty < 0.0 {
            pnl_pct = -pnl_pct;
        }

        self.trades.push(Trade {
            side: if pos.qty > 0.0 { OrderSide::Sell } else { OrderSide::Buy },
            timestamp: ts,
            price: round_to(price, 8),
            qty: round_to(pos.qty, 8),
            amount: None,
            pnl: Some(round_to(pnl, 8)),
            pnl_pct: Some(round_to(pnl_pct, 6)),
            reason,
            order_type: OrderType::Market,
            position_open_timestamp: pos.entry_time,
        });
        tracing::debug!(%ts, price, pnl, reason = reason.as_str(), "position closed");
    }

    pub fn record(&mut self, event: RiskEvent) {
        tracing::warn!(kind = event.kind(), ts = %event.timestamp(), "risk event");
        self.risk_events.push(event);
    }
}
