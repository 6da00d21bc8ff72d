//! High tight flag: price at least doubles, then consolidates in a shallow
//! 20-bar flag.

use super::{max_close, min_close, Pattern, PatternSignal, PIVOT_BUFFER};
use crate::domain::PriceBar;

pub const MIN_BARS: usize = 40;

const MIN_ADVANCE_BARS: usize = 20;
const MAX_ADVANCE_BARS: usize = 40;
const FLAG_BARS: usize = 20;
/// +100%.
const MIN_ADVANCE: f64 = 1.0;
const MIN_PULLBACK: f64 = 0.10;
const MAX_PULLBACK: f64 = 0.20;

pub fn detect_high_tight_flag(bars: &[PriceBar]) -> Option<PatternSignal> {
    let n = bars.len();
    if n < MIN_BARS {
        return None;
    }
    let today = &bars[n - 1];
    let flag = &bars[n - FLAG_BARS..];
    let peak = max_close(flag);
    let flag_high = flag[0].close;
    let pullback = (flag_high - min_close(flag)) / flag_high;

    for advance_len in MIN_ADVANCE_BARS..MAX_ADVANCE_BARS {
        let Some(start_idx) = n.checked_sub(advance_len + FLAG_BARS) else {
            continue;
        };
        let start = bars[start_idx].close;
        let advance = (peak - start) / start;
        if advance < MIN_ADVANCE {
            continue;
        }
        if !(MIN_PULLBACK..=MAX_PULLBACK).contains(&pullback) {
            continue;
        }

        return Some(
            PatternSignal::new(Pattern::HighTightFlag, today, flag_high * PIVOT_BUFFER)
                .with_metric("advance", advance)
                .with_metric("pullback", pullback),
        );
    }
    None
}
