//! CSV loading for bar files and sentiment files.
//!
//! Bar files need `timestamp` (epoch milliseconds), `open`, `high`, `low`,
//! `close` and `volume` columns. Rows with an unparseable timestamp or a
//! non-finite field are dropped; the rest are sorted with the first row of
//! each timestamp kept.
//!
//! Sentiment files are looser: any of `timestamp|time|datetime|date` plus a
//! numeric score column, or a free-text column scored with the lexicon.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use papertrade_core::domain::{clean_bars, Bar};
use papertrade_core::error::InputError;
use papertrade_core::overlay::{score_text, SentimentOverlay, SentimentPoint};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const REQUIRED_COLUMNS: [&str; 6] = ["timestamp", "open", "high", "low", "close", "volume"];

const SENTIMENT_TIME_COLUMNS: [&str; 4] = ["timestamp", "time", "datetime", "date"];
const SENTIMENT_SCORE_COLUMNS: [&str; 4] = ["sentiment", "score", "sentiment_score", "value"];
const SENTIMENT_TEXT_COLUMNS: [&str; 3] = ["headline", "title", "text"];

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed CSV in {}: {source}", path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error(transparent)]
    Input(#[from] InputError),
}

/// Cleaned bars plus how many raw rows were discarded.
#[derive(Debug, Clone)]
pub struct LoadedBars {
    pub bars: Vec<Bar>,
    pub dropped_rows: usize,
}

fn open_reader(path: &Path) -> Result<csv::Reader<std::fs::File>, LoadError> {
    if !path.exists() {
        return Err(InputError::DataFileNotFound {
            path: path.to_path_buf(),
        }
        .into());
    }
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(csv::ReaderBuilder::new().trim(csv::Trim::All).flexible(true).from_reader(file))
}

fn headers_of(reader: &mut csv::Reader<std::fs::File>, path: &Path) -> Result<Vec<String>, LoadError> {
    let headers = reader.headers().map_err(|source| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(headers.iter().map(str::to_string).collect())
}

fn column(headers: &[String], name: &str) -> Option<usize> {
    headers.iter().position(|h| h == name)
}

/// Epoch milliseconds from an integer or an integral float.
fn parse_millis(raw: &str) -> Option<i64> {
    if let Ok(ms) = raw.parse::<i64>() {
        return Some(ms);
    }
    let value = raw.parse::<f64>().ok()?;
    (value.is_finite() && value.fract() == 0.0).then_some(value as i64)
}

// ─── Bar files ──────────────────────────────────────────────────────

/// Load and clean an OHLCV bar file.
pub fn load_bars_csv(path: &Path) -> Result<LoadedBars, LoadError> {
    let mut reader = open_reader(path)?;
    let headers = headers_of(&mut reader, path)?;

    let mut missing: Vec<String> = REQUIRED_COLUMNS
        .iter()
        .filter(|c| column(&headers, c).is_none())
        .map(|c| c.to_string())
        .collect();
    if !missing.is_empty() {
        missing.sort();
        return Err(InputError::MissingColumns { columns: missing }.into());
    }
    // Every required column is present, so these lookups succeed.
    let idx: Vec<usize> = REQUIRED_COLUMNS.iter().filter_map(|c| column(&headers, c)).collect();

    let mut raw = Vec::new();
    let mut total = 0usize;
    for record in reader.records() {
        let record = record.map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        total += 1;
        let field = |i: usize| record.get(idx[i]).unwrap_or("");
        let Some(ts) = parse_millis(field(0)) else {
            continue;
        };
        let mut values = [0.0f64; 5];
        let mut ok = true;
        for (k, value) in values.iter_mut().enumerate() {
            match field(k + 1).parse::<f64>() {
                Ok(v) => *value = v,
                Err(_) => {
                    ok = false;
                    break;
                }
            }
        }
        if !ok {
            continue;
        }
        let [open, high, low, close, volume] = values;
        if let Some(bar) = Bar::from_millis(ts, open, high, low, close, volume) {
            raw.push(bar);
        }
    }

    let bars = clean_bars(raw);
    let dropped_rows = total - bars.len();
    tracing::info!(path = %path.display(), rows = bars.len(), dropped_rows, "bars loaded");
    Ok(LoadedBars { bars, dropped_rows })
}

/// Write bars with the schema [`load_bars_csv`] reads.
pub fn write_bars_csv(path: &Path, bars: &[Bar]) -> Result<(), LoadError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| LoadError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let csv_err = |source| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut wtr = csv::Writer::from_path(path).map_err(csv_err)?;
    wtr.write_record(REQUIRED_COLUMNS).map_err(csv_err)?;
    for bar in bars {
        wtr.write_record([
            bar.timestamp_ms().to_string(),
            bar.open.to_string(),
            bar.high.to_string(),
            bar.low.to_string(),
            bar.close.to_string(),
            bar.volume.to_string(),
        ])
        .map_err(csv_err)?;
    }
    wtr.flush().map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

// ─── Sentiment files ────────────────────────────────────────────────

/// Timestamps in sentiment files: epoch milliseconds, RFC 3339, or a
/// naive `YYYY-MM-DD[ HH:MM:SS]` read as UTC.
pub fn parse_sentiment_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Some(ms) = parse_millis(raw) {
        return Utc.timestamp_millis_opt(ms).single();
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&dt));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| Utc.from_utc_datetime(&dt))
}

enum ScoreSource {
    Numeric(usize),
    Text(usize),
}

/// Load a sentiment file. `Ok(None)` when it has no usable columns or rows.
pub fn load_sentiment_csv(path: &Path) -> Result<Option<SentimentOverlay>, LoadError> {
    let mut reader = open_reader(path)?;
    let headers = headers_of(&mut reader, path)?;

    let Some(ts_col) = SENTIMENT_TIME_COLUMNS.iter().find_map(|c| column(&headers, c)) else {
        tracing::warn!(path = %path.display(), "sentiment file has no timestamp column");
        return Ok(None);
    };
    let source = SENTIMENT_SCORE_COLUMNS
        .iter()
        .find_map(|c| column(&headers, c))
        .map(ScoreSource::Numeric)
        .or_else(|| {
            SENTIMENT_TEXT_COLUMNS
                .iter()
                .find_map(|c| column(&headers, c))
                .map(ScoreSource::Text)
        });
    let Some(source) = source else {
        tracing::warn!(path = %path.display(), "sentiment file has no score or text column");
        return Ok(None);
    };

    let mut points = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|source| LoadError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        let Some(timestamp) = record.get(ts_col).and_then(parse_sentiment_timestamp) else {
            continue;
        };
        let score = match source {
            ScoreSource::Numeric(i) => record.get(i).and_then(|s| s.parse::<f64>().ok()).unwrap_or(0.0),
            ScoreSource::Text(i) => record.get(i).map(score_text).unwrap_or(0.0),
        };
        points.push(SentimentPoint { timestamp, score });
    }

    if points.is_empty() {
        return Ok(None);
    }
    tracing::debug!(path = %path.display(), points = points.len(), "sentiment loaded");
    Ok(Some(SentimentOverlay::new(points)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write(dir: &tempfile::TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn missing_file_is_an_input_error() {
        let err = load_bars_csv(Path::new("/definitely/not/here.csv")).unwrap_err();
        assert!(err.to_string().starts_with("Data file not found: "));
    }

    #[test]
    fn missing_columns_are_listed_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "bars.csv", "timestamp,open,close\n1,1,1\n");
        let err = load_bars_csv(&path).unwrap_err();
        assert_eq!(err.to_string(), "Missing required columns in CSV: high, low, volume");
    }

    #[test]
    fn bad_rows_dropped_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        let body = "\
timestamp,open,high,low,close,volume
3000,3,3,3,3,1
abc,1,1,1,1,1
1000,1,1,1,1,1
2000,2,2,2,inf,1
2000.0,2,2,2,2,1
1000,9,9,9,9,9
4000,4,4,4,,1
";
        let path = write(&dir, "bars.csv", body);
        let loaded = load_bars_csv(&path).unwrap();
        let ts: Vec<i64> = loaded.bars.iter().map(Bar::timestamp_ms).collect();
        assert_eq!(ts, vec![1000, 2000, 3000]);
        assert_eq!(loaded.bars[0].close, 1.0);
        assert_eq!(loaded.dropped_rows, 4);
    }

    #[test]
    fn written_bars_load_back() {
        let dir = tempfile::tempdir().unwrap();
        let bars: Vec<Bar> = (0..3)
            .map(|i| Bar::from_millis(i * 60_000, 1.5, 2.0, 1.0, 1.75, 10.0).unwrap())
            .collect();
        let path = dir.path().join("nested/out.csv");
        write_bars_csv(&path, &bars).unwrap();
        assert_eq!(load_bars_csv(&path).unwrap().bars, bars);
    }

    #[test]
    fn sentiment_timestamp_formats() {
        let ms = parse_sentiment_timestamp("1700000000000").unwrap();
        assert_eq!(ms.timestamp_millis(), 1_700_000_000_000);
        let rfc = parse_sentiment_timestamp("2023-11-14T22:13:20Z").unwrap();
        assert_eq!(rfc, ms);
        let naive = parse_sentiment_timestamp("2023-11-14 22:13:20").unwrap();
        assert_eq!(naive, ms);
        assert!(parse_sentiment_timestamp("2023-11-14").is_some());
        assert!(parse_sentiment_timestamp("yesterday").is_none());
    }

    #[test]
    fn sentiment_prefers_numeric_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "s.csv",
            "date,score,headline\n2023-11-14T22:00:00Z,0.4,bearish crash\n2023-11-14T23:00:00Z,oops,x\n",
        );
        let overlay = load_sentiment_csv(&path).unwrap().unwrap();
        assert_eq!(overlay.len(), 2);
    }

    #[test]
    fn sentiment_scores_headlines_when_no_numeric_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "s.csv", "time,headline\n1700000000000,Bitcoin rally on ETF adoption\n");
        let overlay = load_sentiment_csv(&path).unwrap().unwrap();
        let ts = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        assert_eq!(overlay.align(&[ts], 1.0), vec![1.0]);
    }

    #[test]
    fn sentiment_without_usable_columns_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "s.csv", "when,score\n1,0.5\n");
        assert!(load_sentiment_csv(&path).unwrap().is_none());
    }
}
