//! Chart-pattern detection over a bar window ending "today".
//!
//! Every detector sees only `bars[..]` as handed in; the last bar is today and
//! nothing after it exists. Detectors never hold state and never fail: a window
//! that is too short or matches no candidate simply yields `None`.

pub mod cup_with_handle;
pub mod flat_base;
pub mod high_tight_flag;
pub mod pocket_pivot;

use crate::domain::PriceBar;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

pub use cup_with_handle::detect_cup_with_handle;
pub use flat_base::detect_flat_base;
pub use high_tight_flag::detect_high_tight_flag;
pub use pocket_pivot::detect_pocket_pivot;

/// Buy points sit 1% above the pattern's pivot high.
pub(crate) const PIVOT_BUFFER: f64 = 1.01;

/// The closed set of supported patterns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Pattern {
    CupWithHandle,
    FlatBase,
    HighTightFlag,
    PocketPivot,
}

impl Pattern {
    /// All patterns, in the order `detect_all` evaluates them.
    pub const ALL: [Pattern; 4] = [
        Pattern::CupWithHandle,
        Pattern::FlatBase,
        Pattern::HighTightFlag,
        Pattern::PocketPivot,
    ];

    /// Stable snake_case identifier (config files, serialized output).
    pub fn key(&self) -> &'static str {
        match self {
            Pattern::CupWithHandle => "cup_with_handle",
            Pattern::FlatBase => "flat_base",
            Pattern::HighTightFlag => "high_tight_flag",
            Pattern::PocketPivot => "pocket_pivot",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Pattern::CupWithHandle => "Cup with Handle",
            Pattern::FlatBase => "Flat Base",
            Pattern::HighTightFlag => "High Tight Flag",
            Pattern::PocketPivot => "Pocket Pivot",
        }
    }

    /// Shortest window the detector will look at.
    pub fn min_bars(&self) -> usize {
        match self {
            Pattern::CupWithHandle => cup_with_handle::MIN_BARS,
            Pattern::FlatBase => flat_base::MIN_BARS,
            Pattern::HighTightFlag => high_tight_flag::MIN_BARS,
            Pattern::PocketPivot => pocket_pivot::MIN_BARS,
        }
    }

    /// Run this pattern's detector over `bars`.
    pub fn detect(&self, bars: &[PriceBar]) -> Option<PatternSignal> {
        match self {
            Pattern::CupWithHandle => detect_cup_with_handle(bars),
            Pattern::FlatBase => detect_flat_base(bars),
            Pattern::HighTightFlag => detect_high_tight_flag(bars),
            Pattern::PocketPivot => detect_pocket_pivot(bars),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown pattern '{0}' (expected one of: cup_with_handle, flat_base, high_tight_flag, pocket_pivot)")]
pub struct ParsePatternError(pub String);

impl FromStr for Pattern {
    type Err = ParsePatternError;

    /// Accepts the snake_case key or the display name, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .map(|c| match c {
                ' ' | '-' => '_',
                c => c.to_ascii_lowercase(),
            })
            .collect();
        Pattern::ALL
            .into_iter()
            .find(|p| p.key() == normalized)
            .ok_or_else(|| ParsePatternError(s.to_string()))
    }
}

/// One detector hit on one window.
///
/// `metrics` holds pattern-specific measurements (depths as fractions, lengths
/// in weeks). A `BTreeMap` keeps serialization order stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternSignal {
    pub pattern: Pattern,
    pub detected_on: NaiveDate,
    pub buy_point: f64,
    pub metrics: BTreeMap<String, f64>,
}

impl PatternSignal {
    pub(crate) fn new(pattern: Pattern, today: &PriceBar, buy_point: f64) -> Self {
        Self {
            pattern,
            detected_on: today.date,
            buy_point,
            metrics: BTreeMap::new(),
        }
    }

    pub(crate) fn with_metric(mut self, key: &str, value: f64) -> Self {
        self.metrics.insert(key.to_string(), value);
        self
    }
}

/// Every detector's output for the same window, in [`Pattern::ALL`] order.
pub fn detect_all(bars: &[PriceBar]) -> Vec<PatternSignal> {
    Pattern::ALL
        .iter()
        .filter_map(|pattern| pattern.detect(bars))
        .collect()
}

// ─── Window helpers ─────────────────────────────────────────────────

pub(crate) fn max_close(bars: &[PriceBar]) -> f64 {
    bars.iter().map(|b| b.close).fold(f64::NEG_INFINITY, f64::max)
}

pub(crate) fn min_close(bars: &[PriceBar]) -> f64 {
    bars.iter().map(|b| b.close).fold(f64::INFINITY, f64::min)
}

pub(crate) fn mean_close(bars: &[PriceBar]) -> f64 {
    bars.iter().map(|b| b.close).sum::<f64>() / bars.len() as f64
}

pub(crate) fn mean_volume(bars: &[PriceBar]) -> f64 {
    bars.iter().map(|b| b.volume as f64).sum::<f64>() / bars.len() as f64
}
