//! OHLCV source trait and its error type.

use crate::domain::Bar;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid fetch argument: {0}")]
    InvalidArgument(String),

    #[error("source failure: {0}")]
    Source(String),

    #[error("No OHLCV data returned")]
    NoData,
}

/// A paginated provider of historical bars.
///
/// `fetch` returns at most `limit` bars with timestamps at or after
/// `since_ms`, ordered by timestamp. An empty page means no more data.
pub trait OhlcvSource {
    fn fetch(&mut self, symbol: &str, timeframe: &str, since_ms: i64, limit: usize) -> Result<Vec<Bar>, FetchError>;
}
