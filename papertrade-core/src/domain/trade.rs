//! Trade ledger entries emitted by the state machine on every open and close.

use super::order::{OrderSide, OrderType};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a ledger row was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeReason {
    #[serde(rename = "entry_signal")]
    EntrySignal,
    #[serde(rename = "entry_signal_statarb")]
    EntrySignalStatArb,
    #[serde(rename = "exit_signal")]
    ExitSignal,
    #[serde(rename = "stop_loss_atr")]
    StopLossAtr,
    #[serde(rename = "stop_loss_atr_short")]
    StopLossAtrShort,
    #[serde(rename = "statarb_stop_loss")]
    StatArbStopLoss,
    #[serde(rename = "drawdown-halt")]
    DrawdownHalt,
    #[serde(rename = "eod_close")]
    EodClose,
}

impl TradeReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeReason::EntrySignal => "entry_signal",
            TradeReason::EntrySignalStatArb => "entry_signal_statarb",
            TradeReason::ExitSignal => "exit_signal",
            TradeReason::StopLossAtr => "stop_loss_atr",
            TradeReason::StopLossAtrShort => "stop_loss_atr_short",
            TradeReason::StatArbStopLoss => "statarb_stop_loss",
            TradeReason::DrawdownHalt => "drawdown-halt",
            TradeReason::EodClose => "eod_close",
        }
    }

    pub fn is_entry(&self) -> bool {
        matches!(self, TradeReason::EntrySignal | TradeReason::EntrySignalStatArb)
    }
}

impl fmt::Display for TradeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the trade ledger.
///
/// Opening rows carry `amount`; closing rows carry `pnl` and `pnl_pct`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub side: OrderSide,
    pub timestamp: DateTime<Utc>,
    pub price: f64,
    pub qty: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pnl: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pnl_pct: Option<f64>,
    pub reason: TradeReason,
    pub order_type: OrderType,
    pub position_open_timestamp: DateTime<Utc>,
}

impl Trade {
    pub fn is_close(&self) -> bool {
        self.pnl.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn reason_serializes_with_ledger_codes() {
        assert_eq!(
            serde_json::to_string(&TradeReason::DrawdownHalt).unwrap(),
            "\"drawdown-halt\""
        );
        assert_eq!(
            serde_json::to_string(&TradeReason::StatArbStopLoss).unwrap(),
            "\"statarb_stop_loss\""
        );
        assert!(TradeReason::EntrySignalStatArb.is_entry());
        assert!(!TradeReason::EodClose.is_entry());
    }

    #[test]
    fn opening_row_omits_pnl_fields() {
        let ts = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let trade = Trade {
            side: OrderSide::Buy,
            timestamp: ts,
            price: 100.0,
            qty: 2.0,
            amount: Some(200.0),
            pnl: None,
            pnl_pct: None,
            reason: TradeReason::EntrySignal,
            order_type: OrderType::Market,
            position_open_timestamp: ts,
        };
        let json = serde_json::to_value(&trade).unwrap();
        assert!(json.get("pnl").is_none());
        assert_eq!(json["amount"], 200.0);
        assert_eq!(json["reason"], "entry_signal");
        assert!(!trade.is_close());
    }
}
