//! PriceBar and PriceHistory: the market data the simulation reads.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// OHLCV bar for one ticker on one trading day.
///
/// Bars are owned by whoever loaded them and only ever borrowed by the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

impl PriceBar {
    /// Close above open.
    pub fn is_up_day(&self) -> bool {
        self.close > self.open
    }

    /// Close below open.
    pub fn is_down_day(&self) -> bool {
        self.close < self.open
    }

    /// Basic OHLC sanity check: high >= low, high >= open/close, low <= open/close.
    ///
    /// The core never calls this; loaders use it to report suspicious input.
    pub fn is_sane(&self) -> bool {
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.open > 0.0
            && self.close > 0.0
    }
}

/// Today's bars keyed by ticker. Tickers without a bar today are absent.
pub type PriceMap = HashMap<String, PriceBar>;

/// Chronologically ordered bars for a single ticker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceHistory {
    pub ticker: String,
    pub bars: Vec<PriceBar>,
}

impl PriceHistory {
    pub fn new(ticker: impl Into<String>, bars: Vec<PriceBar>) -> Self {
        Self {
            ticker: ticker.into(),
            bars,
        }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Index of the bar dated exactly `date`, if the ticker traded that day.
    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        self.bars.binary_search_by_key(&date, |b| b.date).ok()
    }

    /// Bars `0..=index`: everything visible on the day of `bars[index]`.
    pub fn window_through(&self, index: usize) -> &[PriceBar] {
        &self.bars[..=index]
    }

    /// The bar immediately after `index` in this ticker's own history.
    pub fn next_after(&self, index: usize) -> Option<&PriceBar> {
        self.bars.get(index + 1)
    }

    /// Last bar dated on or before `date`.
    pub fn last_on_or_before(&self, date: NaiveDate) -> Option<&PriceBar> {
        let end = self.bars.partition_point(|b| b.date <= date);
        end.checked_sub(1).map(|i| &self.bars[i])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(day: u32, close: f64) -> PriceBar {
        PriceBar {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open: close - 1.0,
            high: close + 1.0,
            low: close - 2.0,
            close,
            volume: 1_000,
        }
    }

    fn history() -> PriceHistory {
        PriceHistory::new("SPY", vec![bar(2, 100.0), bar(3, 101.0), bar(5, 103.0)])
    }

    #[test]
    fn bar_is_sane() {
        assert!(bar(2, 100.0).is_sane());
    }

    #[test]
    fn bar_detects_insane_high_low() {
        let mut b = bar(2, 100.0);
        b.high = 90.0;
        assert!(!b.is_sane());
    }

    #[test]
    fn up_and_down_days() {
        let b = bar(2, 100.0);
        assert!(b.is_up_day());
        assert!(!b.is_down_day());
    }

    #[test]
    fn index_of_finds_exact_date_only() {
        let h = history();
        assert_eq!(h.index_of(NaiveDate::from_ymd_opt(2024, 1, 3).unwrap()), Some(1));
        assert_eq!(h.index_of(NaiveDate::from_ymd_opt(2024, 1, 4).unwrap()), None);
    }

    #[test]
    fn window_through_excludes_future_bars() {
        let h = history();
        let window = h.window_through(1);
        assert_eq!(window.len(), 2);
        assert_eq!(window.last().unwrap().close, 101.0);
    }

    #[test]
    fn next_after_last_bar_is_none() {
        let h = history();
        assert_eq!(h.next_after(1).unwrap().close, 103.0);
        assert!(h.next_after(2).is_none());
    }

    #[test]
    fn last_on_or_before_skips_gaps() {
        let h = history();
        let d = NaiveDate::from_ymd_opt(2024, 1, 4).unwrap();
        assert_eq!(h.last_on_or_before(d).unwrap().close, 101.0);
        let early = NaiveDate::from_ymd_opt(2023, 12, 31).unwrap();
        assert!(h.last_on_or_before(early).is_none());
    }

    #[test]
    fn bar_serialization_roundtrip() {
        let b = bar(2, 100.0);
        let json = serde_json::to_string(&b).unwrap();
        let deser: PriceBar = serde_json::from_str(&json).unwrap();
        assert_eq!(b, deser);
    }
}
