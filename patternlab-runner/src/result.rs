//! Backtest output.

use chrono::NaiveDate;
use patternlab_core::domain::ClosedTrade;
use patternlab_core::patterns::Pattern;
use patternlab_core::simulator::{EquityPoint, Metrics};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::breakdown::PatternBreakdown;
use crate::config::{BacktestConfig, RunId};

/// Current schema version for persisted results.
pub const SCHEMA_VERSION: u32 = 1;

/// A detection that turned into an entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalLogEntry {
    /// Day the pattern was detected (window end).
    pub signal_date: NaiveDate,
    pub pattern: Pattern,
    pub buy_point: f64,
    /// Day of the fill, the ticker's next bar after `signal_date`.
    pub entry_date: NaiveDate,
    /// Post-slippage fill price.
    pub entry_price: f64,
}

/// Complete result of one backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub config: BacktestConfig,
    pub dataset_hash: String,
    /// First and last simulated days.
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub tickers_loaded: Vec<String>,
    pub tickers_skipped: Vec<String>,
    pub trading_days: usize,
    /// `None` when no trade closed.
    pub metrics: Option<Metrics>,
    /// Closed trades in exit order, end-of-test closes last.
    pub trades: Vec<ClosedTrade>,
    pub equity_curve: Vec<EquityPoint>,
    pub signal_log: BTreeMap<String, Vec<SignalLogEntry>>,
    pub pattern_breakdown: PatternBreakdown,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl BacktestResult {
    pub fn final_equity(&self) -> Option<f64> {
        self.equity_curve.last().map(|p| p.equity)
    }

    pub fn signal_count(&self) -> usize {
        self.signal_log.values().map(Vec::len).sum()
    }
}
