//! Paginated OHLCV download through an [`OhlcvSource`].

use chrono::{Duration, Utc};
use papertrade_core::data::{FetchError, OhlcvSource};
use papertrade_core::domain::{clean_bars, Bar};
use serde::Serialize;

/// Hard ceiling on rows collected across all pages.
pub const MAX_FETCH_ROWS: usize = 50_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub symbol: String,
    pub timeframe: String,
    pub days: i64,
    pub limit: usize,
    pub max_pages: usize,
}

impl Default for FetchRequest {
    fn default() -> Self {
        Self {
            symbol: "BTC/USDT".to_string(),
            timeframe: "1h".to_string(),
            days: 30,
            limit: 1_000,
            max_pages: 20,
        }
    }
}

impl FetchRequest {
    pub fn validate(&self) -> Result<(), FetchError> {
        if self.days <= 0 {
            return Err(FetchError::InvalidArgument("days must be > 0".into()));
        }
        if self.limit == 0 {
            return Err(FetchError::InvalidArgument("limit must be > 0".into()));
        }
        if self.max_pages == 0 {
            return Err(FetchError::InvalidArgument("max-pages must be > 0".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchSummary {
    pub symbol: String,
    pub timeframe: String,
    pub pages: usize,
    pub rows: usize,
    pub first_timestamp: String,
    pub last_timestamp: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchedHistory {
    pub bars: Vec<Bar>,
    pub summary: FetchSummary,
}

/// Fetch `days` of history ending now.
pub fn fetch_history(source: &mut dyn OhlcvSource, request: &FetchRequest) -> Result<FetchedHistory, FetchError> {
    request.validate()?;
    let since = Utc::now() - Duration::days(request.days);
    fetch_history_since(source, request, since.timestamp_millis())
}

/// Page forward from `since_ms` until the source runs dry or a limit is hit.
pub fn fetch_history_since(
    source: &mut dyn OhlcvSource,
    request: &FetchRequest,
    since_ms: i64,
) -> Result<FetchedHistory, FetchError> {
    request.validate()?;

    let mut since = since_ms;
    let mut collected: Vec<Bar> = Vec::new();
    let mut pages = 0;

    while pages < request.max_pages {
        let page = source.fetch(&request.symbol, &request.timeframe, since, request.limit)?;
        pages += 1;
        let Some(last) = page.last() else {
            break;
        };
        since = last.timestamp_ms() + 1;
        let short = page.len() < request.limit;
        collected.extend(page);
        tracing::debug!(page = pages, rows = collected.len(), next_since = since, "ohlcv page");
        if short || collected.len() >= MAX_FETCH_ROWS {
            break;
        }
    }

    let bars = clean_bars(collected);
    let (Some(first), Some(last)) = (bars.first(), bars.last()) else {
        return Err(FetchError::NoData);
    };
    let summary = FetchSummary {
        symbol: request.symbol.clone(),
        timeframe: request.timeframe.clone(),
        pages,
        rows: bars.len(),
        first_timestamp: first.timestamp.to_rfc3339(),
        last_timestamp: last.timestamp.to_rfc3339(),
    };
    tracing::info!(symbol = %summary.symbol, rows = summary.rows, pages, "ohlcv history fetched");
    Ok(FetchedHistory { bars, summary })
}
