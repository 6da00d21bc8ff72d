//! Summary statistics over a finished simulation.
//!
//! Each statistic is a pure function of the closed-trade ledger and/or the
//! equity curve; [`Metrics::compute`] just gathers them.

use super::portfolio::EquityPoint;
use crate::domain::ClosedTrade;
use serde::{Deserialize, Serialize};

/// Floor for gross loss so a loss-free run still yields a finite profit factor.
pub const PROFIT_FACTOR_EPSILON: f64 = 1e-9;

/// Aggregate results. Return and drawdown fields are fractions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    pub win_rate: f64,
    pub avg_win_pct: f64,
    pub avg_loss_pct: f64,
    pub total_return_dollars: f64,
    pub total_return_pct: f64,
    pub profit_factor: f64,
    /// Largest peak-to-trough decline of the equity curve; zero or negative.
    pub max_drawdown: f64,
    pub avg_hold_days: f64,
    pub final_equity: f64,
}

impl Metrics {
    /// `None` when no trade has closed.
    pub fn compute(
        trades: &[ClosedTrade],
        equity_curve: &[EquityPoint],
        initial_capital: f64,
        cash: f64,
    ) -> Option<Self> {
        if trades.is_empty() {
            return None;
        }
        let winning_trades = trades.iter().filter(|t| t.is_winner()).count();
        let losing_trades = trades.iter().filter(|t| t.is_loser()).count();
        let total_return_dollars: f64 = trades.iter().map(|t| t.return_dollars()).sum();
        let final_equity = equity_curve.last().map(|p| p.equity).unwrap_or(cash);

        Some(Self {
            total_trades: trades.len(),
            winning_trades,
            losing_trades,
            win_rate: win_rate(trades),
            avg_win_pct: mean_return(trades.iter().filter(|t| t.is_winner())),
            avg_loss_pct: mean_return(trades.iter().filter(|t| t.is_loser())),
            total_return_dollars,
            total_return_pct: total_return_dollars / initial_capital,
            profit_factor: profit_factor(trades),
            max_drawdown: max_drawdown(equity_curve),
            avg_hold_days: avg_hold_days(trades),
            final_equity,
        })
    }
}

// ─── Individual statistics ──────────────────────────────────────────

pub fn win_rate(trades: &[ClosedTrade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().filter(|t| t.is_winner()).count() as f64 / trades.len() as f64
}

/// Mean `return_pct` of the given trades, 0.0 when there are none.
pub fn mean_return<'a>(trades: impl Iterator<Item = &'a ClosedTrade>) -> f64 {
    let (sum, count) = trades.fold((0.0, 0usize), |(sum, count), t| (sum + t.return_pct(), count + 1));
    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// Gross dollar profit over gross dollar loss.
pub fn profit_factor(trades: &[ClosedTrade]) -> f64 {
    let gross_profit: f64 = trades
        .iter()
        .map(|t| t.return_dollars())
        .filter(|&d| d > 0.0)
        .sum();
    let gross_loss: f64 = trades
        .iter()
        .map(|t| t.return_dollars())
        .filter(|&d| d < 0.0)
        .map(f64::abs)
        .sum();
    gross_profit / gross_loss.max(PROFIT_FACTOR_EPSILON)
}

/// Most negative `(equity - running_peak) / running_peak`.
pub fn max_drawdown(equity_curve: &[EquityPoint]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut worst = 0.0_f64;
    for point in equity_curve {
        peak = peak.max(point.equity);
        if peak > 0.0 {
            worst = worst.min((point.equity - peak) / peak);
        }
    }
    worst
}

pub fn avg_hold_days(trades: &[ClosedTrade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().map(|t| t.exit().hold_days as f64).sum::<f64>() / trades.len() as f64
}
