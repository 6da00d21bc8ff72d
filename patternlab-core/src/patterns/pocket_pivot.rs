//! Pocket pivot: an up day whose volume tops every down-day volume of the prior
//! ten sessions, closing above its 10-day average.

use super::{mean_close, Pattern, PatternSignal};
use crate::domain::PriceBar;

const LOOKBACK: usize = 10;
pub const MIN_BARS: usize = LOOKBACK + 1;

pub fn detect_pocket_pivot(bars: &[PriceBar]) -> Option<PatternSignal> {
    let n = bars.len();
    if n < MIN_BARS {
        return None;
    }
    let today = &bars[n - 1];
    if !today.is_up_day() {
        return None;
    }

    let prior = &bars[n - 1 - LOOKBACK..n - 1];
    // No down days in the lookback means nothing to out-volume.
    let max_down_volume = prior
        .iter()
        .filter(|b| b.is_down_day())
        .map(|b| b.volume)
        .max()?;
    if today.volume <= max_down_volume {
        return None;
    }

    // Average includes today.
    let sma = mean_close(&bars[n - LOOKBACK..]);
    if today.close <= sma {
        return None;
    }

    Some(
        PatternSignal::new(Pattern::PocketPivot, today, today.close)
            .with_metric(
                "volume_ratio",
                today.volume as f64 / max_down_volume.max(1) as f64,
            )
            .with_metric("sma_10", sma),
    )
}
