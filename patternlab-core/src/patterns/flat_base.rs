//! Flat base: a tight sideways range near the 52-week high, with today's close
//! pressing the top of the range.

use super::{max_close, min_close, Pattern, PatternSignal, PIVOT_BUFFER};
use crate::domain::PriceBar;

pub const MIN_BARS: usize = 30;

const MIN_BASE_BARS: usize = 25;
const MAX_BASE_BARS: usize = 60;
const MIN_RANGE: f64 = 0.10;
const MAX_RANGE: f64 = 0.15;
/// Today's close must sit in the top 5% of the base range.
const MIN_POSITION_IN_RANGE: f64 = 0.95;
/// Base high must be within 5% of the year high.
const MIN_HIGH_VS_YEAR: f64 = 0.95;
const YEAR_BARS: usize = 252;
const BARS_PER_WEEK: usize = 5;

pub fn detect_flat_base(bars: &[PriceBar]) -> Option<PatternSignal> {
    let n = bars.len();
    if n < MIN_BARS {
        return None;
    }
    let today = &bars[n - 1];
    let year_high = max_close(&bars[n.saturating_sub(YEAR_BARS)..]);

    for base_len in MIN_BASE_BARS..MAX_BASE_BARS.min(n) {
        let base = &bars[n - base_len..];
        let high = max_close(base);
        let low = min_close(base);

        let range = (high - low) / low;
        if !(MIN_RANGE..=MAX_RANGE).contains(&range) {
            continue;
        }
        if (today.close - low) / (high - low) < MIN_POSITION_IN_RANGE {
            continue;
        }
        if high < year_high * MIN_HIGH_VS_YEAR {
            continue;
        }

        return Some(
            PatternSignal::new(Pattern::FlatBase, today, high * PIVOT_BUFFER)
                .with_metric("range", range)
                .with_metric("weeks", (base_len / BARS_PER_WEEK) as f64),
        );
    }
    None
}
