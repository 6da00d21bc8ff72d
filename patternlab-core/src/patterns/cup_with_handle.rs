//! Cup with handle: a rounded base with matching rims, then a shallow
//! pullback on drying volume.
//!
//! Cup lengths are scanned shortest first and handle lengths shortest first;
//! the first (cup, handle) pair that passes every test wins.

use super::{max_close, mean_volume, min_close, Pattern, PatternSignal, PIVOT_BUFFER};
use crate::domain::PriceBar;

pub const MIN_BARS: usize = 30;

const MIN_CUP_BARS: usize = 30;
const MAX_CUP_BARS: usize = 120;
const RIM_BARS: usize = 10;
const MIN_CUP_DEPTH: f64 = 0.12;
const MAX_CUP_DEPTH: f64 = 0.33;
/// Right rim may differ from the left rim by at most this fraction.
const MAX_RIM_GAP: f64 = 0.05;

const MIN_HANDLE_BARS: usize = 5;
const MAX_HANDLE_BARS: usize = 20;
const MIN_HANDLE_DEPTH: f64 = 0.08;
const MAX_HANDLE_DEPTH: f64 = 0.12;

const BARS_PER_WEEK: usize = 5;

pub fn detect_cup_with_handle(bars: &[PriceBar]) -> Option<PatternSignal> {
    let n = bars.len();
    if n < MIN_BARS {
        return None;
    }
    let today = &bars[n - 1];

    for cup_len in MIN_CUP_BARS..MAX_CUP_BARS.min(n) {
        let cup = &bars[n - cup_len..];
        let left_high = max_close(&cup[..RIM_BARS]);
        let right_high = max_close(&cup[cup_len - RIM_BARS..]);
        let cup_low = min_close(cup);

        let depth = (left_high - cup_low) / left_high;
        if !(MIN_CUP_DEPTH..=MAX_CUP_DEPTH).contains(&depth) {
            continue;
        }
        if (right_high - left_high).abs() / left_high > MAX_RIM_GAP {
            continue;
        }

        for handle_len in MIN_HANDLE_BARS..MAX_HANDLE_BARS {
            let handle = &cup[cup_len - handle_len..];
            // Pivot is the close the handle starts from.
            let handle_high = handle[0].close;
            let handle_depth = (handle_high - min_close(handle)) / handle_high;
            if !(MIN_HANDLE_DEPTH..=MAX_HANDLE_DEPTH).contains(&handle_depth) {
                continue;
            }

            let body = &cup[..cup_len - handle_len];
            if mean_volume(handle) >= mean_volume(body) {
                continue;
            }

            return Some(
                PatternSignal::new(Pattern::CupWithHandle, today, handle_high * PIVOT_BUFFER)
                    .with_metric("depth", depth)
                    .with_metric("handle_depth", handle_depth)
                    .with_metric("cup_weeks", (cup_len / BARS_PER_WEEK) as f64)
                    .with_metric("handle_weeks", (handle_len / BARS_PER_WEEK) as f64),
            );
        }
    }
    None
}
