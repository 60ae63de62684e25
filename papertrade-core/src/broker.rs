//! Live order executor collaborator.
//!
//! Order-risk gating talks to an exchange only through [`OrderExecutor`].
//! No concrete exchange connector ships with the workspace.

use crate::domain::{OrderSide, OrderType};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("exchange unavailable: {0}")]
    Unavailable(String),

    #[error("order rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub amount: f64,
    /// Required for limit orders, ignored for market orders.
    pub price: Option<f64>,
    /// Ask the exchange to validate without placing the order.
    #[serde(default)]
    pub test: bool,
}

/// Normalised fill returned by the executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub id: Option<String>,
    pub status: Option<String>,
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub amount: f64,
    pub price: Option<f64>,
    pub filled: Option<f64>,
    pub average: Option<f64>,
    pub cost: Option<f64>,
    pub timestamp: Option<i64>,
}

pub trait OrderExecutor {
    /// Last traded price for `symbol`, if the exchange reports one.
    fn market_price(&mut self, symbol: &str) -> Result<Option<f64>, ExecutorError>;

    /// Free balance for one asset code (e.g. `USDT`), `None` when the
    /// exchange does not report that asset.
    fn free_balance(&mut self, asset: &str) -> Result<Option<f64>, ExecutorError>;

    fn submit(&mut self, order: &OrderRequest) -> Result<Fill, ExecutorError>;
}
