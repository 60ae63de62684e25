//! Papertrade CLI: simulation runs and order-risk gating.
//!
//! Commands:
//! - `backtest`, `paper-run`, `portfolio-run`, `ml-run`: run the engine over CSV bars
//! - `execute`: validate one order and, with `--confirm`, submit it
//!
//! Every command prints one JSON object on stdout. Logs go to stderr.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use papertrade_core::domain::{OrderSide, OrderType};
use papertrade_core::{ModelKind, StrategyMode};
use papertrade_runner::{
    execute_order, run_report, ExecuteRequest, FailureReport, RunConfig, RunMode, RunResponse,
};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "papertrade",
    about = "Deterministic backtest and paper-simulation engine"
)]
struct Cli {
    /// Emit logs as JSON lines on stderr.
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Historical backtest over a bar CSV.
    Backtest(RunArgs),
    /// Paper simulation over a bar CSV.
    PaperRun(RunArgs),
    /// Paper simulation of a pair portfolio (use --strategy-mode stat-arb).
    PortfolioRun(RunArgs),
    /// Paper simulation with the probability overlay enabled.
    MlRun(RunArgs),
    /// Validate an order against risk limits and optionally submit it.
    Execute(ExecuteArgs),
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// TOML run configuration. Flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    // ── Data ──
    /// Primary OHLCV CSV (timestamp, open, high, low, close, volume).
    #[arg(long)]
    data_csv: Option<PathBuf>,
    /// Second leg for stat-arb.
    #[arg(long)]
    secondary_data_csv: Option<PathBuf>,
    /// Sentiment CSV with a timestamp and a score or text column.
    #[arg(long)]
    sentiment_csv: Option<PathBuf>,
    /// Write the trade ledger here.
    #[arg(long)]
    trades_csv: Option<PathBuf>,

    // ── Strategy ──
    /// adaptive, mean-reversion, momentum, momentum-only or stat-arb.
    #[arg(long)]
    strategy_mode: Option<StrategyMode>,
    #[arg(long)]
    initial_cash: Option<f64>,
    #[arg(long)]
    position_size: Option<f64>,
    #[arg(long)]
    bb_window: Option<usize>,
    #[arg(long)]
    bb_std: Option<f64>,
    #[arg(long)]
    rsi_period: Option<usize>,
    #[arg(long)]
    rsi_buy: Option<f64>,
    #[arg(long)]
    rsi_sell: Option<f64>,
    #[arg(long)]
    momentum_fast: Option<usize>,
    #[arg(long)]
    momentum_slow: Option<usize>,
    #[arg(long)]
    trend_threshold: Option<f64>,
    /// Disable the trend/range regime split in adaptive mode.
    #[arg(long, default_value_t = false)]
    no_regime: bool,
    #[arg(long)]
    max_portfolio_risk: Option<f64>,
    #[arg(long)]
    fee_rate: Option<f64>,
    #[arg(long)]
    atr_window: Option<usize>,
    #[arg(long)]
    stop_atr_mult: Option<f64>,
    #[arg(long)]
    strategy_correlation_cap: Option<f64>,
    #[arg(long)]
    strategy_correlation_window: Option<usize>,
    #[arg(long)]
    statarb_window: Option<usize>,
    #[arg(long)]
    statarb_z_entry: Option<f64>,
    #[arg(long)]
    statarb_z_exit: Option<f64>,
    #[arg(long)]
    statarb_z_stop: Option<f64>,
    #[arg(long)]
    pair_symbol: Option<String>,
    /// Drawdown circuit level as a fraction; 0 disables it.
    #[arg(long)]
    max_drawdown: Option<f64>,
    /// Nominal bar timeframe, used for Sharpe annualisation.
    #[arg(long)]
    timeframe: Option<String>,

    // ── Overlays ──
    #[arg(long, default_value_t = false)]
    ml_enabled: bool,
    /// random_forest, xgboost or logistic.
    #[arg(long)]
    ml_model: Option<ModelKind>,
    #[arg(long)]
    ml_horizon: Option<usize>,
    #[arg(long)]
    ml_train_ratio: Option<f64>,
    #[arg(long)]
    ml_confidence: Option<f64>,
    #[arg(long)]
    sentiment_weight: Option<f64>,
    #[arg(long)]
    sentiment_threshold: Option<f64>,
}

#[derive(Args, Debug)]
struct ExecuteArgs {
    #[arg(long, default_value = "binance")]
    exchange: String,
    #[arg(long, env = "CCXT_API_KEY", hide_env_values = true)]
    api_key: Option<String>,
    #[arg(long, env = "CCXT_API_SECRET", hide_env_values = true)]
    api_secret: Option<String>,
    #[arg(long, default_value = "BTC/USDT")]
    symbol: String,
    /// buy or sell.
    #[arg(long)]
    side: OrderSide,
    /// market or limit.
    #[arg(long, default_value = "market")]
    order_type: OrderType,
    #[arg(long)]
    amount: f64,
    #[arg(long)]
    price: Option<f64>,
    /// Send the order. Without it the command is a dry run.
    #[arg(long, default_value_t = false)]
    confirm: bool,
    /// Request a test order where the exchange supports it.
    #[arg(long, default_value_t = false)]
    test: bool,
    /// Largest order notional in quote currency; 0 disables the cap.
    #[arg(long, default_value_t = 0.0)]
    max_order_notional: f64,
    /// Largest fraction of the free quote balance a buy may use.
    #[arg(long, default_value_t = 0.20)]
    max_account_fraction: f64,
    #[arg(long, default_value_t = false)]
    skip_balance_check: bool,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    match cli.command {
        Commands::Backtest(args) => run_cmd(RunMode::Backtest, args),
        Commands::PaperRun(args) => run_cmd(RunMode::PaperRun, args),
        Commands::PortfolioRun(args) => run_cmd(RunMode::PortfolioRun, args),
        Commands::MlRun(args) => run_cmd(RunMode::MlRun, args),
        Commands::Execute(args) => execute_cmd(args),
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn emit<T: Serialize>(payload: &T, success: bool) -> Result<ExitCode> {
    let text = serde_json::to_string_pretty(payload).context("failed to serialize output")?;
    println!("{text}");
    Ok(if success { ExitCode::SUCCESS } else { ExitCode::FAILURE })
}

// ─── Run commands ───────────────────────────────────────────────────

fn run_cmd(mode: RunMode, args: RunArgs) -> Result<ExitCode> {
    let config = match build_run_config(mode, args) {
        Ok(config) => config,
        Err(failure) => return emit(&failure, false),
    };
    tracing::debug!(mode = %config.mode, data = %config.data.data_csv.display(), "starting run");

    let response = run_report(&config);
    let success = response.is_success();
    match &response {
        RunResponse::Success(report) => emit(report, success),
        RunResponse::Failure(failure) => emit(failure, success),
    }
}

fn build_run_config(mode: RunMode, args: RunArgs) -> Result<RunConfig, FailureReport> {
    let mut config = match &args.config {
        Some(path) => RunConfig::from_toml_file(path).map_err(|e| FailureReport::new(e.to_string()))?,
        None => RunConfig::default(),
    };
    config.mode = mode;
    apply_overrides(&mut config, args);

    if config.data.data_csv.as_os_str().is_empty() {
        return Err(FailureReport::new("--data-csv is required (flag or [data] data_csv in --config)"));
    }
    Ok(config)
}

fn apply_overrides(config: &mut RunConfig, args: RunArgs) {
    fn set<T>(slot: &mut T, value: Option<T>) {
        if let Some(v) = value {
            *slot = v;
        }
    }

    let data = &mut config.data;
    set(&mut data.data_csv, args.data_csv);
    if args.secondary_data_csv.is_some() {
        data.secondary_data_csv = args.secondary_data_csv;
    }
    if args.sentiment_csv.is_some() {
        data.sentiment_csv = args.sentiment_csv;
    }
    if args.trades_csv.is_some() {
        data.trades_csv = args.trades_csv;
    }

    let s = &mut config.strategy;
    set(&mut s.strategy_mode, args.strategy_mode);
    set(&mut s.initial_cash, args.initial_cash);
    set(&mut s.position_size, args.position_size);
    set(&mut s.bb_window, args.bb_window);
    set(&mut s.bb_std, args.bb_std);
    set(&mut s.rsi_period, args.rsi_period);
    set(&mut s.rsi_buy, args.rsi_buy);
    set(&mut s.rsi_sell, args.rsi_sell);
    set(&mut s.momentum_fast, args.momentum_fast);
    set(&mut s.momentum_slow, args.momentum_slow);
    set(&mut s.trend_threshold, args.trend_threshold);
    if args.no_regime {
        s.use_regime = false;
    }
    set(&mut s.max_portfolio_risk, args.max_portfolio_risk);
    set(&mut s.fee_rate, args.fee_rate);
    set(&mut s.atr_window, args.atr_window);
    set(&mut s.stop_atr_mult, args.stop_atr_mult);
    set(&mut s.strategy_correlation_cap, args.strategy_correlation_cap);
    set(&mut s.strategy_correlation_window, args.strategy_correlation_window);
    set(&mut s.statarb_window, args.statarb_window);
    set(&mut s.statarb_z_entry, args.statarb_z_entry);
    set(&mut s.statarb_z_exit, args.statarb_z_exit);
    set(&mut s.statarb_z_stop, args.statarb_z_stop);
    if args.pair_symbol.is_some() {
        s.pair_symbol = args.pair_symbol;
    }
    set(&mut s.max_drawdown, args.max_drawdown);
    set(&mut s.timeframe, args.timeframe);

    if args.ml_enabled {
        s.ml.enabled = true;
    }
    set(&mut s.ml.model_type, args.ml_model);
    set(&mut s.ml.horizon, args.ml_horizon);
    set(&mut s.ml.train_ratio, args.ml_train_ratio);
    set(&mut s.ml.confidence, args.ml_confidence);
    set(&mut s.sentiment.weight, args.sentiment_weight);
    set(&mut s.sentiment.threshold, args.sentiment_threshold);
}

// ─── Execute ────────────────────────────────────────────────────────

fn execute_cmd(args: ExecuteArgs) -> Result<ExitCode> {
    let request = ExecuteRequest {
        exchange: args.exchange,
        symbol: args.symbol,
        side: args.side,
        order_type: args.order_type,
        amount: args.amount,
        price: args.price,
        confirm: args.confirm,
        test: args.test,
        max_order_notional: args.max_order_notional,
        max_account_fraction: args.max_account_fraction,
        skip_balance_check: args.skip_balance_check,
        api_key: args.api_key,
        api_secret: args.api_secret,
    };
    // No exchange connector ships with this binary; live orders stop at
    // the connection check.
    let response = execute_order(&request, None);
    emit(&response, response.success)
}
