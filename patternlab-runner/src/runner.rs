//! Backtest runner: wires loading, detection and the portfolio together.
//!
//! Two entry points:
//! - `run_backtest()`: loads histories through a provider, then runs.
//! - `run_backtest_from_data()`: takes histories already in memory. No I/O.
//!
//! The simulation is a fold over the sorted trading-day clock. Each day, in order:
//! 1. build today's price map
//! 2. apply stop, time and take-profit exits
//! 3. detect patterns on every eligible ticker (optionally on the rayon pool)
//! 4. enter on the ticker's next bar open, universe order first, never past the final day
//! 5. record equity
//!
//! After the last day every open position is closed as end-of-test.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use patternlab_core::domain::{ExitReason, PriceHistory, PriceMap};
use patternlab_core::patterns::{Pattern, PatternSignal};
use patternlab_core::simulator::Portfolio;
use rayon::prelude::*;
use thiserror::Error;
use tracing::{debug, info};

use crate::breakdown::PatternBreakdown;
use crate::config::{BacktestConfig, ConfigError};
use crate::data_loader::{load_histories, CsvDirectoryProvider, LoadError, LoadedData, PriceHistoryProvider};
use crate::result::{BacktestResult, SignalLogEntry, SCHEMA_VERSION};

/// A ticker is only scanned once it has this many bars up to and including today.
pub const MIN_HISTORY_BARS: usize = 60;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("no trading days in range for tickers {tickers:?}")]
    NoSimulationClock { tickers: Vec<String> },
}

/// Load every configured ticker through `provider`, then run.
pub fn run_backtest(
    config: &BacktestConfig,
    provider: &dyn PriceHistoryProvider,
) -> Result<BacktestResult, RunError> {
    config.validate()?;
    info!(
        phase = "LOADING",
        tickers = config.tickers.len(),
        provider = provider.name(),
        start = %config.start_date,
        end = %config.end_date,
        "loading price histories"
    );
    let loaded = load_histories(&config.tickers, provider, config.start_date, config.end_date);
    run_backtest_from_data(config, &loaded)
}

/// Run against `<dir>/<TICKER>.csv` files.
pub fn run_backtest_from_csv(
    config: &BacktestConfig,
    dir: impl Into<std::path::PathBuf>,
) -> Result<BacktestResult, RunError> {
    let provider = CsvDirectoryProvider::open(dir)?;
    run_backtest(config, &provider)
}

/// Run with histories already in memory.
///
/// Histories are used in the order given; pass them in universe order.
pub fn run_backtest_from_data(
    config: &BacktestConfig,
    loaded: &LoadedData,
) -> Result<BacktestResult, RunError> {
    config.validate()?;

    let clock = simulation_clock(&loaded.histories, config.start_date, config.end_date);
    let (Some(&first_day), Some(&final_day)) = (clock.first(), clock.last()) else {
        return Err(RunError::NoSimulationClock {
            tickers: config.tickers.clone(),
        });
    };
    info!(
        phase = "SIMULATING",
        tickers = loaded.histories.len(),
        skipped = loaded.skipped.len(),
        days = clock.len(),
        parallel = config.parallel_detection,
        "starting simulation"
    );

    let sim = Simulation {
        histories: &loaded.histories,
        patterns: config.patterns.patterns(),
        stop_loss_pct: config.simulator.stop_loss_pct,
        parallel: config.parallel_detection,
        final_day,
    };
    let state = clock.iter().fold(
        SimState::new(Portfolio::new(config.simulator.clone())),
        |state, &date| sim.step(state, date),
    );
    let SimState {
        mut portfolio,
        signal_log,
    } = state;

    sim.close_at_end(&mut portfolio, final_day);

    let metrics = portfolio.metrics();
    let (trades, equity_curve) = portfolio.into_results();
    let pattern_breakdown = PatternBreakdown::from_trades(&trades);

    info!(
        phase = "FINALIZED",
        trades = trades.len(),
        final_equity = equity_curve.last().map(|p| p.equity).unwrap_or(config.simulator.initial_capital),
        "simulation complete"
    );

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        run_id: config.run_id(),
        config: config.clone(),
        dataset_hash: loaded.dataset_hash.clone(),
        start_date: first_day,
        end_date: final_day,
        tickers_loaded: loaded.tickers(),
        tickers_skipped: loaded.skipped.clone(),
        trading_days: clock.len(),
        metrics,
        trades,
        equity_curve,
        signal_log,
        pattern_breakdown,
    })
}

/// Sorted union of every bar date within `start..=end`.
pub fn simulation_clock(histories: &[PriceHistory], start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let dates: BTreeSet<NaiveDate> = histories
        .iter()
        .flat_map(|h| h.bars.iter().map(|b| b.date))
        .filter(|d| *d >= start && *d <= end)
        .collect();
    dates.into_iter().collect()
}

/// Today's bar for every ticker that traded today.
pub fn price_map_for(histories: &[PriceHistory], date: NaiveDate) -> PriceMap {
    histories
        .iter()
        .filter_map(|h| {
            h.index_of(date)
                .map(|i| (h.ticker.clone(), h.bars[i].clone()))
        })
        .collect()
}

/// State threaded through the daily fold.
struct SimState {
    portfolio: Portfolio,
    signal_log: BTreeMap<String, Vec<SignalLogEntry>>,
}

impl SimState {
    fn new(portfolio: Portfolio) -> Self {
        Self {
            portfolio,
            signal_log: BTreeMap::new(),
        }
    }
}

/// Detections for one ticker on one day.
struct Detection {
    history: usize,
    bar: usize,
    signals: Vec<PatternSignal>,
}

/// Read-only inputs shared by every step.
struct Simulation<'a> {
    histories: &'a [PriceHistory],
    patterns: Vec<Pattern>,
    stop_loss_pct: f64,
    parallel: bool,
    /// Bars after this day may be present but are never traded on.
    final_day: NaiveDate,
}

impl Simulation<'_> {
    fn step(&self, mut state: SimState, date: NaiveDate) -> SimState {
        let prices = price_map_for(self.histories, date);

        let exits = state.portfolio.update_positions(date, &prices);
        if exits > 0 {
            debug!(date = %date, exits, "positions closed");
        }

        if state.portfolio.can_enter_trade() {
            for detection in self.detect(date, &state.portfolio) {
                self.enter(&mut state, date, detection);
            }
        }

        state.portfolio.record_equity(date, &prices);
        state
    }

    /// Run detectors on every ticker that traded today, has enough history
    /// and is not already held. Results come back in universe order.
    fn detect(&self, date: NaiveDate, portfolio: &Portfolio) -> Vec<Detection> {
        let candidates: Vec<(usize, usize)> = self
            .histories
            .iter()
            .enumerate()
            .filter(|(_, h)| !portfolio.holds(&h.ticker))
            .filter_map(|(i, h)| {
                let bar = h.index_of(date)?;
                (bar + 1 >= MIN_HISTORY_BARS).then_some((i, bar))
            })
            .collect();

        let run = |&(history, bar): &(usize, usize)| Detection {
            history,
            bar,
            signals: self.detect_window(history, bar),
        };
        let detections: Vec<Detection> = if self.parallel {
            candidates.par_iter().map(run).collect()
        } else {
            candidates.iter().map(run).collect()
        };
        detections.into_iter().filter(|d| !d.signals.is_empty()).collect()
    }

    fn detect_window(&self, history: usize, bar: usize) -> Vec<PatternSignal> {
        let window = self.histories[history].window_through(bar);
        self.patterns.iter().filter_map(|p| p.detect(window)).collect()
    }

    /// Try each signal in detector order; the first fill makes the ticker held.
    fn enter(&self, state: &mut SimState, date: NaiveDate, detection: Detection) {
        let history = &self.histories[detection.history];
        let Some(next) = history
            .next_after(detection.bar)
            .filter(|b| b.date <= self.final_day)
        else {
            return;
        };

        for signal in detection.signals {
            if state.portfolio.holds(&history.ticker) {
                break;
            }
            let Some(trade) = state.portfolio.enter_trade(
                &history.ticker,
                signal.pattern,
                next.date,
                next.open,
                self.stop_loss_pct,
            ) else {
                continue;
            };
            let entry_price = trade.entry().entry_price;
            debug!(
                ticker = %history.ticker,
                pattern = signal.pattern.key(),
                signal_date = %date,
                entry_date = %next.date,
                entry_price,
                "entered"
            );
            state
                .signal_log
                .entry(history.ticker.clone())
                .or_default()
                .push(SignalLogEntry {
                    signal_date: signal.detected_on,
                    pattern: signal.pattern,
                    buy_point: signal.buy_point,
                    entry_date: next.date,
                    entry_price,
                });
        }
    }

    /// Close whatever is still open at each ticker's last close on or before `final_day`.
    fn close_at_end(&self, portfolio: &mut Portfolio, final_day: NaiveDate) {
        let open: Vec<String> = portfolio
            .open_trades()
            .iter()
            .map(|t| t.ticker().to_string())
            .collect();
        for ticker in open {
            let last_close = self
                .histories
                .iter()
                .find(|h| h.ticker == ticker)
                .and_then(|h| h.last_on_or_before(final_day))
                .map(|b| b.close);
            if let Some(price) = last_close {
                portfolio.exit_trade(&ticker, final_day, price, ExitReason::EndOfTest);
                debug!(ticker = %ticker, date = %final_day, price, "closed at end of test");
            }
        }
    }
}
