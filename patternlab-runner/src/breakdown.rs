//! Per-pattern trade statistics.

use patternlab_core::domain::ClosedTrade;
use patternlab_core::patterns::Pattern;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Outcome summary for trades entered on one pattern.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PatternStats {
    pub trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
    /// Mean fractional return per trade.
    pub avg_return_pct: f64,
    pub total_return_dollars: f64,
}

/// Closed trades grouped by the pattern that triggered them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatternBreakdown {
    by_pattern: BTreeMap<Pattern, PatternStats>,
}

impl PatternBreakdown {
    pub fn from_trades(trades: &[ClosedTrade]) -> Self {
        let mut sums: BTreeMap<Pattern, (PatternStats, f64)> = BTreeMap::new();
        for trade in trades {
            let (stats, return_sum) = sums.entry(trade.pattern()).or_default();
            stats.trades += 1;
            if trade.is_winner() {
                stats.wins += 1;
            } else if trade.is_loser() {
                stats.losses += 1;
            }
            stats.total_return_dollars += trade.return_dollars();
            *return_sum += trade.return_pct();
        }

        let by_pattern = sums
            .into_iter()
            .map(|(pattern, (mut stats, return_sum))| {
                let n = stats.trades as f64;
                stats.win_rate = stats.wins as f64 / n;
                stats.avg_return_pct = return_sum / n;
                (pattern, stats)
            })
            .collect();
        Self { by_pattern }
    }

    pub fn get(&self, pattern: Pattern) -> Option<&PatternStats> {
        self.by_pattern.get(&pattern)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Pattern, &PatternStats)> {
        self.by_pattern.iter().map(|(p, s)| (*p, s))
    }

    pub fn len(&self) -> usize {
        self.by_pattern.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_pattern.is_empty()
    }
}
