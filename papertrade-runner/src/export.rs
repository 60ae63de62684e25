//! Trade ledger export: CSV file and JSON string.
//!
//! CSV columns: side, timestamp, price, qty, amount, pnl, pnl_pct, reason,
//! order_type, position_open_timestamp. `amount` is empty on closing rows;
//! `pnl` and `pnl_pct` are empty on opening rows.

use papertrade_core::domain::Trade;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const TRADE_COLUMNS: [&str; 10] = [
    "side",
    "timestamp",
    "price",
    "qty",
    "amount",
    "pnl",
    "pnl_pct",
    "reason",
    "order_type",
    "position_open_timestamp",
];

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("failed to write {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write trade CSV {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("failed to serialize trades: {0}")]
    Json(#[from] serde_json::Error),
}

fn opt(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn trade_record(t: &Trade) -> [String; 10] {
    [
        t.side.as_str().to_string(),
        t.timestamp.to_rfc3339(),
        t.price.to_string(),
        t.qty.to_string(),
        opt(t.amount),
        opt(t.pnl),
        opt(t.pnl_pct),
        t.reason.as_str().to_string(),
        t.order_type.as_str().to_string(),
        t.position_open_timestamp.to_rfc3339(),
    ]
}

/// Render the ledger as CSV text.
pub fn trades_to_csv(trades: &[Trade]) -> Result<String, csv::Error> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(TRADE_COLUMNS)?;
    for t in trades {
        wtr.write_record(trade_record(t))?;
    }
    let bytes = wtr.into_inner().map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Write the ledger CSV, creating parent directories.
pub fn write_trades_csv(path: &Path, trades: &[Trade]) -> Result<(), ExportError> {
    let text = trades_to_csv(trades).map_err(|source| ExportError::Csv {
        path: path.to_path_buf(),
        source,
    })?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| ExportError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, text).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %path.display(), rows = trades.len(), "trade ledger written");
    Ok(())
}

/// Pretty JSON array of ledger rows.
pub fn trades_to_json(trades: &[Trade]) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(trades)?)
}
