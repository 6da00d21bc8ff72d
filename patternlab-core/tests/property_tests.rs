//! Property tests for simulator invariants.
//!
//! Uses proptest to verify:
//! 1. Capacity: open positions never exceed `max_positions`
//! 2. Cash accounting: cash == initial - entry costs + exit proceeds - one commission per fill
//! 3. Each trade closes at most once and every exit is on or after its entry
//! 4. Metrics: win/loss counts bounded, drawdown non-positive, profit factor finite
//! 5. Detectors never panic and always price above zero on positive data

use chrono::NaiveDate;
use patternlab_core::domain::{ExitReason, PriceBar, PriceMap};
use patternlab_core::patterns::{detect_all, Pattern};
use patternlab_core::simulator::{Portfolio, SimulatorConfig};
use proptest::prelude::*;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_price() -> impl Strategy<Value = f64> {
    (5.0..500.0_f64).prop_map(|p| (p * 100.0).round() / 100.0)
}

fn arb_config() -> impl Strategy<Value = SimulatorConfig> {
    (1usize..6, 0.05..0.5_f64, 0.02..0.2_f64, 0.0..0.01_f64, 0.0..10.0_f64).prop_map(
        |(max_positions, max_position_pct, stop_loss_pct, slippage_pct, commission)| SimulatorConfig {
            initial_capital: 100_000.0,
            max_position_pct,
            max_positions,
            stop_loss_pct,
            commission,
            slippage_pct,
        },
    )
}

/// Daily (low, close) moves relative to the entry price.
fn arb_days() -> impl Strategy<Value = Vec<(f64, f64)>> {
    prop::collection::vec((0.7..1.1_f64, 0.8..1.4_f64), 1..60)
}

fn arb_bars() -> impl Strategy<Value = Vec<PriceBar>> {
    prop::collection::vec((arb_price(), 0.9..1.1_f64, 1u64..10_000_000), 0..160).prop_map(|rows| {
        let base = NaiveDate::from_ymd_opt(2021, 1, 4).unwrap();
        rows.into_iter()
            .enumerate()
            .map(|(i, (close, open_ratio, volume))| {
                let open = close * open_ratio;
                PriceBar {
                    date: base + chrono::Duration::days(i as i64),
                    open,
                    high: open.max(close) * 1.02,
                    low: open.min(close) * 0.98,
                    close,
                    volume,
                }
            })
            .collect()
    })
}

const TICKERS: [&str; 4] = ["AAA", "BBB", "CCC", "DDD"];

fn day(i: usize) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Duration::days(i as i64)
}

fn price_map(entry: f64, low_ratio: f64, close_ratio: f64, date: NaiveDate) -> PriceMap {
    TICKERS
        .iter()
        .map(|t| {
            let close = entry * close_ratio;
            let low = entry * low_ratio.min(close_ratio);
            let bar = PriceBar {
                date,
                open: entry,
                high: entry.max(close) * 1.01,
                low,
                close,
                volume: 1_000_000,
            };
            (t.to_string(), bar)
        })
        .collect()
}

proptest! {
    #[test]
    fn open_positions_never_exceed_capacity(config in arb_config(), price in arb_price()) {
        let max = config.max_positions;
        let mut p = Portfolio::new(config);
        for (i, t) in TICKERS.iter().chain(TICKERS.iter()).enumerate() {
            p.enter_trade(t, Pattern::FlatBase, day(i), price, 0.08);
            prop_assert!(p.open_trades().len() <= max);
        }
    }

    #[test]
    fn cash_matches_ledger(config in arb_config(), entry in arb_price(), days in arb_days()) {
        let initial = config.initial_capital;
        let mut p = Portfolio::new(config.clone());
        for t in TICKERS {
            p.enter_trade(t, Pattern::PocketPivot, day(0), entry, config.stop_loss_pct);
        }
        for (i, (low_ratio, close_ratio)) in days.iter().enumerate() {
            let date = day(i + 1);
            let prices = price_map(entry, *low_ratio, *close_ratio, date);
            p.update_positions(date, &prices);
            p.record_equity(date, &prices);
        }

        let spent: f64 = p.open_trades().iter().map(|t| t.entry().cost_basis()).sum::<f64>()
            + p.closed_trades().iter().map(|t| t.entry().cost_basis()).sum::<f64>();
        let received: f64 = p
            .closed_trades()
            .iter()
            .map(|t| t.entry().shares as f64 * t.exit().exit_price)
            .sum();
        // One commission per fill: entry and exit for closed trades, entry only for open ones.
        let fills = (2 * p.closed_trades().len() + p.open_trades().len()) as f64;
        let fees = fills * config.commission;
        prop_assert!((p.cash() - (initial - spent + received - fees)).abs() < 1e-6);
    }

    #[test]
    fn trades_close_once_and_in_order(config in arb_config(), entry in arb_price(), days in arb_days()) {
        let mut p = Portfolio::new(config.clone());
        for t in TICKERS {
            p.enter_trade(t, Pattern::HighTightFlag, day(0), entry, config.stop_loss_pct);
        }
        let opened = p.open_trades().len();
        for (i, (low_ratio, close_ratio)) in days.iter().enumerate() {
            let date = day(i + 1);
            p.update_positions(date, &price_map(entry, *low_ratio, *close_ratio, date));
        }
        prop_assert_eq!(p.open_trades().len() + p.closed_trades().len(), opened);

        let mut tickers: Vec<&str> = p.closed_trades().iter().map(|t| t.ticker()).collect();
        tickers.sort_unstable();
        tickers.dedup();
        prop_assert_eq!(tickers.len(), p.closed_trades().len());

        for t in p.closed_trades() {
            prop_assert!(t.exit().exit_date >= t.entry().entry_date);
            prop_assert!(t.exit().exit_reason != ExitReason::EndOfTest);
            if t.exit().exit_reason == ExitReason::TimeExit {
                prop_assert!(t.exit().hold_days >= 30);
            }
        }
    }

    #[test]
    fn metrics_stay_in_range(config in arb_config(), entry in arb_price(), days in arb_days()) {
        let mut p = Portfolio::new(config.clone());
        for t in TICKERS {
            p.enter_trade(t, Pattern::CupWithHandle, day(0), entry, config.stop_loss_pct);
        }
        for (i, (low_ratio, close_ratio)) in days.iter().enumerate() {
            let date = day(i + 1);
            let prices = price_map(entry, *low_ratio, *close_ratio, date);
            p.update_positions(date, &prices);
            p.record_equity(date, &prices);
        }
        if let Some(m) = p.metrics() {
            prop_assert!(m.winning_trades + m.losing_trades <= m.total_trades);
            prop_assert!((0.0..=1.0).contains(&m.win_rate));
            prop_assert!(m.max_drawdown <= 0.0);
            prop_assert!(m.profit_factor.is_finite());
            prop_assert!(m.profit_factor >= 0.0);
        } else {
            prop_assert!(p.closed_trades().is_empty());
        }
    }

    #[test]
    fn detectors_never_panic(bars in arb_bars()) {
        for signal in detect_all(&bars) {
            prop_assert!(signal.buy_point > 0.0);
            prop_assert_eq!(Some(signal.detected_on), bars.last().map(|b| b.date));
        }
    }
}
