//! Pre-trade risk gating for a single order.
//!
//! Checks run in a fixed sequence and each appends exactly one
//! [`RiskBlock`]. The first blocking check ends the sequence with a status
//! code. Without `confirm` nothing touches the executor (dry run).

use chrono::Utc;
use papertrade_core::broker::{Fill, OrderExecutor, OrderRequest};
use papertrade_core::domain::{OrderSide, OrderType};
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    Pass,
    Skip,
    Blocked,
    Fail,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskBlock {
    pub name: String,
    pub status: CheckStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Count of risk blocks per status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RiskSummary {
    pub pass: usize,
    pub skip: usize,
    pub blocked: usize,
    pub fail: usize,
}

impl RiskSummary {
    fn record(&mut self, status: CheckStatus) {
        match status {
            CheckStatus::Pass => self.pass += 1,
            CheckStatus::Skip => self.skip += 1,
            CheckStatus::Blocked => self.blocked += 1,
            CheckStatus::Fail => self.fail += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.pass + self.skip + self.blocked + self.fail
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    InvalidInput,
    SymbolBlocked,
    DryRun,
    RiskLimitBlocked,
    LiveBlocked,
    RiskCheckFailed,
    ExecutionFailed,
    Submitted,
}

/// One order to validate and, with `confirm`, submit.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecuteRequest {
    pub exchange: String,
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub amount: f64,
    pub price: Option<f64>,
    /// Place the order live. Without it the run is a dry run.
    pub confirm: bool,
    /// Ask the exchange for a test order when supported.
    pub test: bool,
    /// Notional cap; 0 disables the check.
    pub max_order_notional: f64,
    /// Largest fraction of the free quote balance one buy may use.
    pub max_account_fraction: f64,
    pub skip_balance_check: bool,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
}

impl Default for ExecuteRequest {
    fn default() -> Self {
        Self {
            exchange: "binance".to_string(),
            symbol: "BTC/USDT".to_string(),
            side: OrderSide::Buy,
            order_type: OrderType::Market,
            amount: 0.0,
            price: None,
            confirm: false,
            test: false,
            max_order_notional: 0.0,
            max_account_fraction: 0.20,
            skip_balance_check: false,
            api_key: None,
            api_secret: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestedOrder {
    #[serde(rename = "type")]
    pub order_type: OrderType,
    pub side: OrderSide,
    pub symbol: String,
    pub amount: f64,
    pub price: Option<f64>,
    pub test_mode: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskChecks {
    pub notional_cap: f64,
    pub account_fraction_cap: f64,
    pub skip_balance_check: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionReport {
    pub timestamp: String,
    pub exchange: String,
    pub symbol: String,
    pub requested_order: RequestedOrder,
    pub risk_blocks: Vec<RiskBlock>,
    pub risk_summary: RiskSummary,
    pub fill: Option<Fill>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResponse {
    pub success: bool,
    pub mode: String,
    pub status: ExecutionStatus,
    pub exchange: String,
    pub symbol: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimated_notional: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cap_notional: Option<f64>,
    pub risk_checks: RiskChecks,
    pub risk_blocks: Vec<RiskBlock>,
    pub risk_summary: RiskSummary,
    pub execution_report: ExecutionReport,
}

// ─── Gate ───────────────────────────────────────────────────────────

struct Gate<'a> {
    request: &'a ExecuteRequest,
    symbol: String,
    timestamp: String,
    blocks: Vec<RiskBlock>,
    summary: RiskSummary,
    estimated_notional: Option<f64>,
    cap_notional: Option<f64>,
}

impl<'a> Gate<'a> {
    fn new(request: &'a ExecuteRequest) -> Self {
        Self {
            request,
            symbol: request.symbol.trim().to_uppercase(),
            timestamp: Utc::now().to_rfc3339(),
            blocks: Vec::new(),
            summary: RiskSummary::default(),
            estimated_notional: None,
            cap_notional: None,
        }
    }

    fn add(&mut self, name: &str, status: CheckStatus, message: Option<String>, details: Option<Value>) {
        self.summary.record(status);
        self.blocks.push(RiskBlock {
            name: name.to_string(),
            status,
            message,
            details,
        });
    }

    fn note(&mut self, name: &str, status: CheckStatus, message: impl Into<String>) {
        self.add(name, status, Some(message.into()), None);
    }

    fn finish(
        self,
        success: bool,
        status: ExecutionStatus,
        error: Option<String>,
        message: Option<String>,
        fill: Option<Fill>,
    ) -> ExecutionResponse {
        let r = self.request;
        tracing::info!(symbol = %self.symbol, status = ?status, success, "order gating finished");
        let execution_report = ExecutionReport {
            timestamp: self.timestamp.clone(),
            exchange: r.exchange.clone(),
            symbol: self.symbol.clone(),
            requested_order: RequestedOrder {
                order_type: r.order_type,
                side: r.side,
                symbol: self.symbol.clone(),
                amount: r.amount,
                price: r.price,
                test_mode: r.test,
            },
            risk_blocks: self.blocks.clone(),
            risk_summary: self.summary,
            fill,
        };
        ExecutionResponse {
            success,
            mode: "execute".to_string(),
            status,
            exchange: r.exchange.clone(),
            symbol: self.symbol,
            timestamp: self.timestamp,
            error,
            message,
            estimated_notional: self.estimated_notional,
            cap_notional: self.cap_notional,
            risk_checks: RiskChecks {
                notional_cap: r.max_order_notional,
                account_fraction_cap: r.max_account_fraction,
                skip_balance_check: r.skip_balance_check,
            },
            risk_blocks: self.blocks,
            risk_summary: self.summary,
            execution_report,
        }
    }

    fn reject(self, status: ExecutionStatus, error: impl Into<String>) -> ExecutionResponse {
        self.finish(false, status, Some(error.into()), None, None)
    }

    /// Record the notional cap check. False when the estimate exceeds the cap.
    fn notional_cap(&mut self, estimate: f64, source: Option<&str>) -> bool {
        let cap = self.request.max_order_notional;
        if estimate > cap {
            self.note(
                "notional_cap",
                CheckStatus::Blocked,
                format!("Estimated notional {estimate} exceeds cap {cap}."),
            );
            self.estimated_notional = Some(estimate);
            self.cap_notional = Some(cap);
            return false;
        }
        let mut details = json!({"estimated_notional": estimate, "max_order_notional": cap});
        if let Some(source) = source {
            details["source"] = json!(source);
        }
        self.add("notional_cap", CheckStatus::Pass, None, Some(details));
        true
    }
}

fn positive(value: Option<f64>) -> Option<f64> {
    value.filter(|v| v.is_finite() && *v > 0.0)
}

// ─── Entry point ────────────────────────────────────────────────────

/// Validate an order and, when confirmed, submit it through `executor`.
pub fn execute_order(request: &ExecuteRequest, executor: Option<&mut dyn OrderExecutor>) -> ExecutionResponse {
    let mut gate = Gate::new(request);
    let is_limit = request.order_type == OrderType::Limit;

    // ─── Input validation ───
    if !(request.amount.is_finite() && request.amount > 0.0) {
        gate.note("order_amount", CheckStatus::Blocked, "Amount must be greater than 0.");
        return gate.reject(ExecutionStatus::InvalidInput, "amount must be greater than 0");
    }
    gate.note("order_amount", CheckStatus::Pass, "Validated amount.");

    if is_limit && positive(request.price).is_none() {
        gate.note("order_price", CheckStatus::Blocked, "Limit orders require price > 0.");
        return gate.reject(ExecutionStatus::InvalidInput, "limit orders require price > 0");
    }
    if is_limit {
        gate.note("order_price", CheckStatus::Pass, "Limit order price present.");
    } else {
        gate.note(
            "order_price",
            CheckStatus::Skip,
            "Market order uses live ticker for pre-flight checks.",
        );
    }

    let parts: Vec<String> = gate.symbol.split('/').map(|p| p.trim().to_string()).collect();
    let pair = match parts.as_slice() {
        [base, quote] if !base.is_empty() && !quote.is_empty() => Some((base.clone(), quote.clone())),
        _ => None,
    };
    let Some((base, quote)) = pair else {
        gate.note("symbol_format", CheckStatus::Blocked, "Expected BASE/QUOTE format.");
        return gate.reject(
            ExecutionStatus::SymbolBlocked,
            "Execution only supports pair format BASE/QUOTE, for example BTC/USDT",
        );
    };
    gate.note("symbol_format", CheckStatus::Pass, "Accepted BASE/QUOTE format.");

    if !request.confirm {
        return dry_run(gate);
    }
    live(gate, executor, &base, &quote)
}

fn dry_run(mut gate: Gate<'_>) -> ExecutionResponse {
    let request = gate.request;
    gate.note(
        "execution_confirmation",
        CheckStatus::Skip,
        "Dry-run mode enabled (no live execution).",
    );

    if request.max_order_notional > 0.0 {
        let source = (request.order_type == OrderType::Market).then_some("provided_price");
        match positive(request.price) {
            Some(price) => {
                let estimate = request.amount * price;
                if !gate.notional_cap(estimate, source) {
                    let cap = request.max_order_notional;
                    return gate.reject(
                        ExecutionStatus::RiskLimitBlocked,
                        format!("Order notional {estimate:.8} exceeds max-order-notional {cap:.8}"),
                    );
                }
            }
            None => gate.note(
                "notional_cap",
                CheckStatus::Skip,
                "Market order notional unavailable in dry-run mode without price or live ticker.",
            ),
        }
    } else {
        gate.note("notional_cap", CheckStatus::Skip, "No notional cap configured (0).");
    }

    if request.max_account_fraction > 0.0 && !request.skip_balance_check {
        gate.note("balance_cap", CheckStatus::Skip, "Balance check skipped for dry-run mode.");
    } else {
        gate.note(
            "balance_cap",
            CheckStatus::Skip,
            "Balance guard disabled for dry-run or max-account-fraction.",
        );
    }

    gate.finish(
        true,
        ExecutionStatus::DryRun,
        None,
        Some("Order prepared but not sent. Add confirm to execute live.".to_string()),
        None,
    )
}

fn live(
    mut gate: Gate<'_>,
    executor: Option<&mut dyn OrderExecutor>,
    base: &str,
    quote: &str,
) -> ExecutionResponse {
    let request = gate.request;
    gate.note("execution_confirmation", CheckStatus::Pass, "Live execution requested.");

    let has = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
    if !has(&request.api_key) || !has(&request.api_secret) {
        gate.note(
            "exchange_credentials",
            CheckStatus::Blocked,
            "Exchange API credentials missing.",
        );
        return gate.reject(
            ExecutionStatus::LiveBlocked,
            "Live order requires an exchange API key and secret",
        );
    }
    gate.add("exchange_credentials", CheckStatus::Pass, None, None);

    let Some(executor) = executor else {
        gate.note(
            "exchange_connection",
            CheckStatus::Fail,
            format!("No connector available for exchange '{}'.", request.exchange),
        );
        return gate.reject(
            ExecutionStatus::LiveBlocked,
            format!("Exchange initialization failed: no connector for '{}'", request.exchange),
        );
    };
    gate.note("exchange_connection", CheckStatus::Pass, "Exchange initialized.");

    let symbol = gate.symbol.clone();
    let is_market = request.order_type == OrderType::Market;

    // ─── Notional cap ───
    let cap = request.max_order_notional;
    if cap > 0.0 {
        let estimate = if is_market {
            match positive(executor.market_price(&symbol).ok().flatten()) {
                Some(price) => request.amount * price,
                None => {
                    gate.note(
                        "notional_cap",
                        CheckStatus::Fail,
                        "Unable to read market price for notional estimation.",
                    );
                    return gate.reject(
                        ExecutionStatus::LiveBlocked,
                        "Live market order requires a live price for guardrail evaluation.",
                    );
                }
            }
        } else {
            request.amount * request.price.unwrap_or(0.0)
        };
        if estimate.is_nan() || estimate <= 0.0 {
            gate.note("notional_cap", CheckStatus::Fail, "Notional estimate could not be computed.");
            return gate.reject(
                ExecutionStatus::LiveBlocked,
                "Could not evaluate order notional; aborting live execution.",
            );
        }
        if !gate.notional_cap(estimate, None) {
            return gate.reject(
                ExecutionStatus::RiskLimitBlocked,
                format!("Order notional {estimate:.8} exceeds max-order-notional {cap}"),
            );
        }
    } else {
        gate.note("notional_cap", CheckStatus::Skip, "No notional cap configured (0).");
    }

    // ─── Balance cap ───
    let fraction = request.max_account_fraction;
    if !request.skip_balance_check && fraction > 0.0 && fraction <= 1.0 {
        match request.side {
            OrderSide::Buy => {
                let available = match executor.free_balance(quote) {
                    Ok(Some(v)) => v,
                    Ok(None) => {
                        gate.note(
                            "balance_cap",
                            CheckStatus::Skip,
                            format!("Quote balance unavailable for {quote}."),
                        );
                        return submit(gate, executor, symbol);
                    }
                    Err(e) => {
                        gate.note("balance_cap", CheckStatus::Fail, format!("Balance check failed: {e}"));
                        return gate.reject(
                            ExecutionStatus::RiskCheckFailed,
                            format!("Balance check failed, set skip_balance_check to bypass: {e}"),
                        );
                    }
                };
                let cap_quote = available * fraction;
                let estimate = if is_market {
                    positive(executor.market_price(&symbol).ok().flatten()).map(|p| request.amount * p)
                } else {
                    Some(request.amount * request.price.unwrap_or(0.0))
                };
                match estimate {
                    Some(notional) if notional > cap_quote => {
                        let pct = fraction * 100.0;
                        gate.note(
                            "balance_cap",
                            CheckStatus::Blocked,
                            format!(
                                "Estimated notional {notional:.8} exceeds {pct:.2}% of available quote ({cap_quote:.8})."
                            ),
                        );
                        gate.estimated_notional = Some(notional);
                        return gate.reject(
                            ExecutionStatus::RiskLimitBlocked,
                            format!(
                                "Live order exceeds account cap: estimated notional {notional:.8} > {pct:.2}% of available quote ({cap_quote:.8})"
                            ),
                        );
                    }
                    Some(notional) => gate.add(
                        "balance_cap",
                        CheckStatus::Pass,
                        None,
                        Some(json!({
                            "quote_available": available,
                            "account_fraction": fraction,
                            "account_quote_cap": cap_quote,
                            "estimated_notional": notional,
                        })),
                    ),
                    None => gate.note(
                        "balance_cap",
                        CheckStatus::Skip,
                        "Market price unavailable for live notional cap validation; balance check cannot be completed.",
                    ),
                }
            }
            OrderSide::Sell => {
                let available = match executor.free_balance(base) {
                    Ok(v) => v,
                    Err(e) => {
                        gate.note("balance_cap", CheckStatus::Fail, format!("Balance check failed: {e}"));
                        return gate.reject(
                            ExecutionStatus::RiskCheckFailed,
                            format!("Balance check failed, set skip_balance_check to bypass: {e}"),
                        );
                    }
                };
                if let Some(available) = available.filter(|v| request.amount > *v) {
                    gate.note(
                        "balance_cap",
                        CheckStatus::Blocked,
                        format!("Sell amount {} exceeds available base {available}.", request.amount),
                    );
                    return gate.reject(
                        ExecutionStatus::RiskLimitBlocked,
                        format!("Sell amount {} exceeds available base balance {available}", request.amount),
                    );
                }
                gate.add(
                    "balance_cap",
                    CheckStatus::Pass,
                    None,
                    Some(json!({"base_available": available})),
                );
            }
        }
    } else {
        gate.note(
            "balance_cap",
            CheckStatus::Skip,
            "Balance guard disabled by skip_balance_check or max-account-fraction config.",
        );
    }

    submit(gate, executor, symbol)
}

fn submit(mut gate: Gate<'_>, executor: &mut dyn OrderExecutor, symbol: String) -> ExecutionResponse {
    let request = gate.request;
    let order = OrderRequest {
        symbol,
        side: request.side,
        order_type: request.order_type,
        amount: request.amount,
        price: match request.order_type {
            OrderType::Market => None,
            OrderType::Limit => request.price,
        },
        test: request.test,
    };
    match executor.submit(&order) {
        Ok(fill) => {
            gate.note("order_submission", CheckStatus::Pass, "Exchange accepted order.");
            gate.finish(
                true,
                ExecutionStatus::Submitted,
                None,
                Some("Order submitted to exchange.".to_string()),
                Some(fill),
            )
        }
        Err(e) => {
            gate.note("order_submission", CheckStatus::Fail, format!("order submission raised: {e}"));
            gate.reject(ExecutionStatus::ExecutionFailed, format!("Order submission failed: {e}"))
        }
    }
}
