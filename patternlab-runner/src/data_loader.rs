//! Price-history loading for the runner.
//!
//! A [`PriceHistoryProvider`] turns a ticker and a date range into bars.
//! [`load_histories`] walks the universe in order, keeps every ticker that
//! produced at least one bar, and fingerprints the result. A ticker that fails
//! to load is logged and dropped; it never aborts the run.

use chrono::NaiveDate;
use patternlab_core::domain::{PriceBar, PriceHistory};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error for '{ticker}': {source}")]
    Csv {
        ticker: String,
        #[source]
        source: csv::Error,
    },

    #[error("bad row for '{ticker}' at line {line}: {reason}")]
    BadRow {
        ticker: String,
        line: u64,
        reason: String,
    },

    #[error("no price data for '{ticker}' in the requested range")]
    NoData { ticker: String },
}

/// Source of daily bars. Implementations must be shareable across threads.
pub trait PriceHistoryProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Bars for `ticker` dated within `start..=end`, in any order.
    fn fetch(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<PriceBar>, LoadError>;
}

/// Preloaded bars keyed by ticker.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProvider {
    histories: HashMap<String, Vec<PriceBar>>,
}

impl InMemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_history(mut self, ticker: impl Into<String>, bars: Vec<PriceBar>) -> Self {
        self.insert(ticker, bars);
        self
    }

    pub fn insert(&mut self, ticker: impl Into<String>, bars: Vec<PriceBar>) {
        self.histories.insert(ticker.into(), bars);
    }
}

impl PriceHistoryProvider for InMemoryProvider {
    fn name(&self) -> &str {
        "memory"
    }

    fn fetch(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<PriceBar>, LoadError> {
        let bars = self.histories.get(ticker).ok_or_else(|| LoadError::NoData {
            ticker: ticker.to_string(),
        })?;
        Ok(bars
            .iter()
            .filter(|b| b.date >= start && b.date <= end)
            .cloned()
            .collect())
    }
}

/// Reads `<dir>/<TICKER>.csv` with header `date,open,high,low,close,volume`.
#[derive(Debug, Clone)]
pub struct CsvDirectoryProvider {
    dir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    date: NaiveDate,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

impl CsvDirectoryProvider {
    /// Fails if `dir` is not a readable directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, LoadError> {
        let dir = dir.into();
        match std::fs::metadata(&dir) {
            Ok(meta) if meta.is_dir() => Ok(Self { dir }),
            Ok(_) => Err(LoadError::Io {
                source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "not a directory"),
                path: dir,
            }),
            Err(source) => Err(LoadError::Io { path: dir, source }),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, ticker: &str) -> PathBuf {
        self.dir.join(format!("{ticker}.csv"))
    }
}

impl PriceHistoryProvider for CsvDirectoryProvider {
    fn name(&self) -> &str {
        "csv"
    }

    fn fetch(&self, ticker: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<PriceBar>, LoadError> {
        let path = self.path_for(ticker);
        let file = std::fs::File::open(&path).map_err(|source| LoadError::Io {
            path: path.clone(),
            source,
        })?;
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(file);

        let headers = reader.headers().map_err(|e| row_error(ticker, 1, e))?.clone();
        let mut record = csv::StringRecord::new();
        let mut bars = Vec::new();
        while reader
            .read_record(&mut record)
            .map_err(|e| row_error(ticker, 0, e))?
        {
            let line = record.position().map_or(0, |p| p.line());
            let row: CsvRow = record
                .deserialize(Some(&headers))
                .map_err(|e| row_error(ticker, line, e))?;
            if row.date < start || row.date > end {
                continue;
            }
            bars.push(to_bar(ticker, line, row)?);
        }
        Ok(bars)
    }
}

/// `line` is used when the error itself carries no position.
fn row_error(ticker: &str, line: u64, err: csv::Error) -> LoadError {
    if let csv::ErrorKind::Deserialize { pos, err: de } = err.kind() {
        return LoadError::BadRow {
            ticker: ticker.to_string(),
            line: pos.as_ref().map_or(line, |p| p.line()),
            reason: de.to_string(),
        };
    }
    LoadError::Csv {
        ticker: ticker.to_string(),
        source: err,
    }
}

fn to_bar(ticker: &str, line: u64, row: CsvRow) -> Result<PriceBar, LoadError> {
    let prices = [row.open, row.high, row.low, row.close];
    if prices.iter().any(|p| !p.is_finite() || *p <= 0.0) {
        return Err(LoadError::BadRow {
            ticker: ticker.to_string(),
            line,
            reason: format!("non-positive price on {}", row.date),
        });
    }
    if !row.volume.is_finite() || row.volume < 0.0 {
        return Err(LoadError::BadRow {
            ticker: ticker.to_string(),
            line,
            reason: format!("negative volume on {}", row.date),
        });
    }
    Ok(PriceBar {
        date: row.date,
        open: row.open,
        high: row.high,
        low: row.low,
        close: row.close,
        volume: row.volume.round() as u64,
    })
}

/// Histories that loaded, in universe order, plus a fingerprint of their bars.
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub histories: Vec<PriceHistory>,
    /// BLAKE3 over every bar, in history order.
    pub dataset_hash: String,
    /// Tickers that failed or returned no bars.
    pub skipped: Vec<String>,
}

impl LoadedData {
    /// Wrap histories that are already in memory. Empty histories are skipped.
    pub fn from_histories(histories: Vec<PriceHistory>) -> Self {
        let (histories, skipped): (Vec<_>, Vec<_>) =
            histories.into_iter().partition(|h| !h.is_empty());
        let histories: Vec<PriceHistory> = histories.into_iter().map(sorted).collect();
        Self {
            dataset_hash: compute_dataset_hash(&histories),
            histories,
            skipped: skipped.into_iter().map(|h| h.ticker).collect(),
        }
    }

    pub fn tickers(&self) -> Vec<String> {
        self.histories.iter().map(|h| h.ticker.clone()).collect()
    }
}

/// Fetch every ticker in order. Failures and empty results are logged and skipped.
pub fn load_histories(
    tickers: &[String],
    provider: &dyn PriceHistoryProvider,
    start: NaiveDate,
    end: NaiveDate,
) -> LoadedData {
    let mut histories = Vec::with_capacity(tickers.len());
    let mut skipped = Vec::new();

    for ticker in tickers {
        match provider.fetch(ticker, start, end) {
            Ok(bars) if bars.is_empty() => {
                warn!(ticker = %ticker, provider = provider.name(), "no bars in range, skipping");
                skipped.push(ticker.clone());
            }
            Ok(bars) => {
                let history = sorted(PriceHistory::new(ticker.as_str(), bars));
                let insane = history.bars.iter().filter(|b| !b.is_sane()).count();
                if insane > 0 {
                    warn!(ticker = %ticker, bars = insane, "bars with inconsistent OHLC");
                }
                debug!(ticker = %ticker, bars = history.len(), "loaded");
                histories.push(history);
            }
            Err(err) => {
                warn!(ticker = %ticker, provider = provider.name(), error = %err, "load failed, skipping");
                skipped.push(ticker.clone());
            }
        }
    }

    LoadedData {
        dataset_hash: compute_dataset_hash(&histories),
        histories,
        skipped,
    }
}

/// Chronological order with one bar per date (the last one wins).
fn sorted(mut history: PriceHistory) -> PriceHistory {
    history.bars.sort_by_key(|b| b.date);
    let mut deduped: Vec<PriceBar> = Vec::with_capacity(history.bars.len());
    for bar in history.bars {
        match deduped.last_mut() {
            Some(last) if last.date == bar.date => *last = bar,
            _ => deduped.push(bar),
        }
    }
    history.bars = deduped;
    history
}

/// Deterministic BLAKE3 hash over tickers, dates and OHLCV values.
fn compute_dataset_hash(histories: &[PriceHistory]) -> String {
    let mut hasher = blake3::Hasher::new();
    for history in histories {
        hasher.update(history.ticker.as_bytes());
        for bar in &history.bars {
            hasher.update(bar.date.to_string().as_bytes());
            hasher.update(&bar.open.to_le_bytes());
            hasher.update(&bar.high.to_le_bytes());
            hasher.update(&bar.low.to_le_bytes());
            hasher.update(&bar.close.to_le_bytes());
            hasher.update(&bar.volume.to_le_bytes());
        }
    }
    hasher.finalize().to_hex().to_string()
}
