//! Order-risk gating against an in-memory executor.

use papertrade_core::broker::{ExecutorError, Fill, OrderExecutor, OrderRequest};
use papertrade_core::domain::{OrderSide, OrderType};
use papertrade_runner::{execute_order, CheckStatus, ExecuteRequest, ExecutionResponse, ExecutionStatus};
use std::collections::HashMap;

struct MockExchange {
    price: Option<f64>,
    balances: HashMap<String, f64>,
    balance_error: bool,
    reject: bool,
    submitted: Vec<OrderRequest>,
}

impl MockExchange {
    fn new(price: f64) -> Self {
        Self {
            price: Some(price),
            balances: HashMap::from([("USDT".to_string(), 10_000.0), ("BTC".to_string(), 0.5)]),
            balance_error: false,
            reject: false,
            submitted: Vec::new(),
        }
    }
}

impl OrderExecutor for MockExchange {
    fn market_price(&mut self, _symbol: &str) -> Result<Option<f64>, ExecutorError> {
        Ok(self.price)
    }

    fn free_balance(&mut self, asset: &str) -> Result<Option<f64>, ExecutorError> {
        if self.balance_error {
            return Err(ExecutorError::Unavailable(format!("balance endpoint down for {asset}")));
        }
        Ok(self.balances.get(asset).copied())
    }

    fn submit(&mut self, order: &OrderRequest) -> Result<Fill, ExecutorError> {
        if self.reject {
            return Err(ExecutorError::Rejected("insufficient margin".into()));
        }
        self.submitted.push(order.clone());
        Ok(Fill {
            id: Some("42".into()),
            status: Some("closed".into()),
            symbol: order.symbol.clone(),
            side: order.side,
            order_type: order.order_type,
            amount: order.amount,
            price: self.price,
            filled: Some(order.amount),
            average: self.price,
            cost: self.price.map(|p| p * order.amount),
            timestamp: Some(1_700_000_000_000),
        })
    }
}

fn live(amount: f64) -> ExecuteRequest {
    ExecuteRequest {
        amount,
        confirm: true,
        api_key: Some("key".into()),
        api_secret: Some("secret".into()),
        ..ExecuteRequest::default()
    }
}

fn block_status(resp: &ExecutionResponse, name: &str) -> Option<CheckStatus> {
    resp.risk_blocks.iter().find(|b| b.name == name).map(|b| b.status)
}

fn assert_summary_consistent(resp: &ExecutionResponse) {
    assert_eq!(resp.risk_summary.total(), resp.risk_blocks.len());
    assert_eq!(resp.execution_report.risk_blocks, resp.risk_blocks);
}

#[test]
fn live_market_buy_within_limits_is_submitted() {
    let mut exchange = MockExchange::new(30_000.0);
    let req = ExecuteRequest {
        max_order_notional: 5_000.0,
        ..live(0.05)
    };
    let resp = execute_order(&req, Some(&mut exchange));

    assert!(resp.success);
    assert_eq!(resp.status, ExecutionStatus::Submitted);
    assert_eq!(block_status(&resp, "notional_cap"), Some(CheckStatus::Pass));
    assert_eq!(block_status(&resp, "balance_cap"), Some(CheckStatus::Pass));
    assert_eq!(resp.risk_summary.blocked + resp.risk_summary.fail, 0);
    assert!(resp.execution_report.fill.is_some());
    assert_eq!(exchange.submitted.len(), 1);
    assert_eq!(exchange.submitted[0].price, None);
    assert_summary_consistent(&resp);
}

#[test]
fn live_buy_over_account_fraction_is_blocked() {
    let mut exchange = MockExchange::new(30_000.0);
    // 0.1 BTC = 3 000 USDT > 20% of 10 000.
    let resp = execute_order(&live(0.1), Some(&mut exchange));

    assert!(!resp.success);
    assert_eq!(resp.status, ExecutionStatus::RiskLimitBlocked);
    assert_eq!(block_status(&resp, "balance_cap"), Some(CheckStatus::Blocked));
    assert!(exchange.submitted.is_empty());
    assert_summary_consistent(&resp);
}

#[test]
fn live_sell_beyond_base_balance_is_blocked() {
    let mut exchange = MockExchange::new(30_000.0);
    let req = ExecuteRequest {
        side: OrderSide::Sell,
        ..live(1.0)
    };
    let resp = execute_order(&req, Some(&mut exchange));
    assert_eq!(resp.status, ExecutionStatus::RiskLimitBlocked);
    assert!(exchange.submitted.is_empty());
}

#[test]
fn live_market_without_price_cannot_check_notional() {
    let mut exchange = MockExchange::new(30_000.0);
    exchange.price = None;
    let req = ExecuteRequest {
        max_order_notional: 1_000.0,
        ..live(0.01)
    };
    let resp = execute_order(&req, Some(&mut exchange));
    assert_eq!(resp.status, ExecutionStatus::LiveBlocked);
    assert_eq!(block_status(&resp, "notional_cap"), Some(CheckStatus::Fail));
}

#[test]
fn balance_lookup_failure_is_a_risk_check_failure() {
    let mut exchange = MockExchange::new(30_000.0);
    exchange.balance_error = true;
    let resp = execute_order(&live(0.01), Some(&mut exchange));
    assert_eq!(resp.status, ExecutionStatus::RiskCheckFailed);
    assert_eq!(block_status(&resp, "balance_cap"), Some(CheckStatus::Fail));
}

#[test]
fn skip_balance_check_bypasses_the_guard() {
    let mut exchange = MockExchange::new(30_000.0);
    exchange.balance_error = true;
    let req = ExecuteRequest {
        skip_balance_check: true,
        ..live(0.01)
    };
    let resp = execute_order(&req, Some(&mut exchange));
    assert_eq!(resp.status, ExecutionStatus::Submitted);
    assert_eq!(block_status(&resp, "balance_cap"), Some(CheckStatus::Skip));
}

#[test]
fn unreported_quote_balance_skips_the_guard() {
    let mut exchange = MockExchange::new(30_000.0);
    exchange.balances.clear();
    // 3 000 USDT would breach a 20% cap on 10 000, but no balance is reported.
    let resp = execute_order(&live(0.1), Some(&mut exchange));

    assert_eq!(resp.status, ExecutionStatus::Submitted);
    let block = resp.risk_blocks.iter().find(|b| b.name == "balance_cap").unwrap();
    assert_eq!(block.status, CheckStatus::Skip);
    assert_eq!(block.message.as_deref(), Some("Quote balance unavailable for USDT."));
    assert_eq!(exchange.submitted.len(), 1);
    assert_summary_consistent(&resp);
}

#[test]
fn unreported_base_balance_lets_a_sell_through() {
    let mut exchange = MockExchange::new(30_000.0);
    exchange.balances.clear();
    let req = ExecuteRequest {
        side: OrderSide::Sell,
        ..live(1.0)
    };
    let resp = execute_order(&req, Some(&mut exchange));
    assert_eq!(resp.status, ExecutionStatus::Submitted);
    assert_eq!(block_status(&resp, "balance_cap"), Some(CheckStatus::Pass));
}

#[test]
fn test_flag_reaches_the_exchange() {
    let mut exchange = MockExchange::new(30_000.0);
    let req = ExecuteRequest {
        test: true,
        ..live(0.01)
    };
    let resp = execute_order(&req, Some(&mut exchange));
    assert_eq!(resp.status, ExecutionStatus::Submitted);
    assert!(exchange.submitted[0].test);
    assert!(resp.execution_report.requested_order.test_mode);

    let mut exchange = MockExchange::new(30_000.0);
    execute_order(&live(0.01), Some(&mut exchange));
    assert!(!exchange.submitted[0].test);
}

#[test]
fn rejected_submission_is_execution_failed() {
    let mut exchange = MockExchange::new(30_000.0);
    exchange.reject = true;
    let resp = execute_order(&live(0.01), Some(&mut exchange));
    assert!(!resp.success);
    assert_eq!(resp.status, ExecutionStatus::ExecutionFailed);
    assert_eq!(block_status(&resp, "order_submission"), Some(CheckStatus::Fail));
    assert_summary_consistent(&resp);
}

#[test]
fn live_without_credentials_is_blocked() {
    let mut exchange = MockExchange::new(30_000.0);
    let req = ExecuteRequest {
        api_secret: None,
        ..live(0.01)
    };
    let resp = execute_order(&req, Some(&mut exchange));
    assert_eq!(resp.status, ExecutionStatus::LiveBlocked);
    assert_eq!(block_status(&resp, "exchange_credentials"), Some(CheckStatus::Blocked));
}

#[test]
fn live_without_connector_is_blocked() {
    let resp = execute_order(&live(0.01), None);
    assert_eq!(resp.status, ExecutionStatus::LiveBlocked);
    assert_eq!(block_status(&resp, "exchange_connection"), Some(CheckStatus::Fail));
}

#[test]
fn dry_run_never_touches_the_executor() {
    let mut exchange = MockExchange::new(30_000.0);
    let req = ExecuteRequest {
        order_type: OrderType::Limit,
        price: Some(29_000.0),
        max_order_notional: 5_000.0,
        ..ExecuteRequest::default()
    };
    let req = ExecuteRequest { amount: 0.1, ..req };
    let resp = execute_order(&req, Some(&mut exchange));

    assert!(resp.success);
    assert_eq!(resp.status, ExecutionStatus::DryRun);
    assert_eq!(block_status(&resp, "notional_cap"), Some(CheckStatus::Pass));
    assert!(exchange.submitted.is_empty());

    let json = serde_json::to_value(&resp).unwrap();
    assert_eq!(json["status"], "dry_run");
    assert_eq!(json["execution_report"]["requested_order"]["type"], "limit");
}
