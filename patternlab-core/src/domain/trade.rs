//! Trade lifecycle: an open trade is closed exactly once.
//!
//! An [`OpenTrade`] carries only entry terms. Closing it consumes the value and
//! yields a [`ClosedTrade`] with both entry and exit terms, so exit fields can
//! never be read before they exist and a trade cannot be closed twice.

use crate::patterns::Pattern;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a position was closed. Checked in this order during daily updates,
/// except `EndOfTest` which is only used by the final forced close.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    StopLoss,
    TimeExit,
    TakeProfit,
    EndOfTest,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TimeExit => "time_exit",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::EndOfTest => "end_of_test",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entry terms, fixed at creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEntry {
    pub ticker: String,
    pub pattern: Pattern,
    pub entry_date: NaiveDate,
    /// Post-slippage fill price.
    pub entry_price: f64,
    /// Dollar allotment the share count was sized from.
    pub position_size: f64,
    pub shares: u64,
    pub stop_loss_pct: f64,
    pub stop_loss_price: f64,
}

impl TradeEntry {
    /// Dollars paid for the shares, excluding commission.
    pub fn cost_basis(&self) -> f64 {
        self.shares as f64 * self.entry_price
    }
}

/// Exit terms, set once by [`OpenTrade::close`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeExit {
    pub exit_date: NaiveDate,
    /// Post-slippage fill price.
    pub exit_price: f64,
    pub exit_reason: ExitReason,
    /// Fractional return on the fill prices (0.10 = +10%).
    pub return_pct: f64,
    pub return_dollars: f64,
    /// Calendar days between entry and exit.
    pub hold_days: i64,
}

/// A position that has been entered and not yet exited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenTrade {
    entry: TradeEntry,
}

impl OpenTrade {
    pub fn new(entry: TradeEntry) -> Self {
        Self { entry }
    }

    pub fn entry(&self) -> &TradeEntry {
        &self.entry
    }

    pub fn ticker(&self) -> &str {
        &self.entry.ticker
    }

    /// Calendar days since entry as of `date`.
    pub fn days_held(&self, date: NaiveDate) -> i64 {
        (date - self.entry.entry_date).num_days()
    }

    pub fn market_value(&self, price: f64) -> f64 {
        self.entry.shares as f64 * price
    }

    /// Close the position at an already-slipped fill price.
    pub fn close(self, exit_date: NaiveDate, exit_price: f64, exit_reason: ExitReason) -> ClosedTrade {
        let entry = self.entry;
        let per_share = exit_price - entry.entry_price;
        let exit = TradeExit {
            exit_date,
            exit_price,
            exit_reason,
            return_pct: per_share / entry.entry_price,
            return_dollars: per_share * entry.shares as f64,
            hold_days: (exit_date - entry.entry_date).num_days(),
        };
        ClosedTrade { entry, exit }
    }
}

/// A completed round trip. Serializes as one flat ledger row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    #[serde(flatten)]
    entry: TradeEntry,
    #[serde(flatten)]
    exit: TradeExit,
}

impl ClosedTrade {
    pub fn entry(&self) -> &TradeEntry {
        &self.entry
    }

    pub fn exit(&self) -> &TradeExit {
        &self.exit
    }

    pub fn ticker(&self) -> &str {
        &self.entry.ticker
    }

    pub fn pattern(&self) -> Pattern {
        self.entry.pattern
    }

    pub fn return_pct(&self) -> f64 {
        self.exit.return_pct
    }

    pub fn return_dollars(&self) -> f64 {
        self.exit.return_dollars
    }

    pub fn is_winner(&self) -> bool {
        self.exit.return_pct > 0.0
    }

    pub fn is_loser(&self) -> bool {
        self.exit.return_pct < 0.0
    }
}

/// Either phase of a trade's lifecycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Trade {
    Open(OpenTrade),
    Closed(ClosedTrade),
}

impl Trade {
    pub fn entry(&self) -> &TradeEntry {
        match self {
            Trade::Open(t) => t.entry(),
            Trade::Closed(t) => t.entry(),
        }
    }

    pub fn exit(&self) -> Option<&TradeExit> {
        match self {
            Trade::Open(_) => None,
            Trade::Closed(t) => Some(t.exit()),
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Trade::Open(_))
    }
}

impl From<OpenTrade> for Trade {
    fn from(trade: OpenTrade) -> Self {
        Trade::Open(trade)
    }
}

impl From<ClosedTrade> for Trade {
    fn from(trade: ClosedTrade) -> Self {
        Trade::Closed(trade)
    }
}
