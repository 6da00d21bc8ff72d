//! Portfolio: cash, open positions, the closed-trade ledger and the equity curve.
//!
//! One `Portfolio` is owned by one simulation and mutated only through `&mut self`.

use super::config::SimulatorConfig;
use super::metrics::Metrics;
use crate::domain::{ClosedTrade, ExitReason, OpenTrade, PriceBar, PriceMap, TradeEntry};
use crate::patterns::Pattern;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Positions smaller than this are not worth opening.
pub const MIN_POSITION_DOLLARS: f64 = 100.0;
/// Calendar days after which a position is closed regardless of price.
pub const MAX_HOLD_DAYS: i64 = 30;
/// Close at or above `entry_price * TAKE_PROFIT_MULTIPLE` takes profit.
pub const TAKE_PROFIT_MULTIPLE: f64 = 1.25;

/// One end-of-day snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    pub equity: f64,
    pub cash: f64,
    pub open_positions: usize,
}

#[derive(Debug, Clone)]
pub struct Portfolio {
    config: SimulatorConfig,
    cash: f64,
    open_trades: Vec<OpenTrade>,
    closed_trades: Vec<ClosedTrade>,
    equity_curve: Vec<EquityPoint>,
}

impl Portfolio {
    pub fn new(config: SimulatorConfig) -> Self {
        Self {
            cash: config.initial_capital,
            config,
            open_trades: Vec::new(),
            closed_trades: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    pub fn config(&self) -> &SimulatorConfig {
        &self.config
    }

    pub fn cash(&self) -> f64 {
        self.cash
    }

    /// Open positions in entry order.
    pub fn open_trades(&self) -> &[OpenTrade] {
        &self.open_trades
    }

    /// Closed positions in exit order.
    pub fn closed_trades(&self) -> &[ClosedTrade] {
        &self.closed_trades
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    pub fn holds(&self, ticker: &str) -> bool {
        self.open_trades.iter().any(|t| t.ticker() == ticker)
    }

    /// Dollars the next position would be sized from.
    pub fn position_allotment(&self) -> f64 {
        self.cash * self.config.max_position_pct
    }

    /// Room for another position, and enough cash to make it worthwhile.
    pub fn can_enter_trade(&self) -> bool {
        self.open_trades.len() < self.config.max_positions
            && self.position_allotment() >= MIN_POSITION_DOLLARS
    }

    /// Open a position at `price` (before slippage).
    ///
    /// Returns `None` and leaves the portfolio untouched when
    /// [`can_enter_trade`](Self::can_enter_trade) is false.
    pub fn enter_trade(
        &mut self,
        ticker: &str,
        pattern: Pattern,
        date: NaiveDate,
        price: f64,
        stop_loss_pct: f64,
    ) -> Option<&OpenTrade> {
        if !self.can_enter_trade() {
            return None;
        }
        let position_size = self.position_allotment();
        let entry_price = self.config.entry_fill(price);
        let shares = (position_size / entry_price).floor() as u64;

        let entry = TradeEntry {
            ticker: ticker.to_string(),
            pattern,
            entry_date: date,
            entry_price,
            position_size,
            shares,
            stop_loss_pct,
            stop_loss_price: entry_price * (1.0 - stop_loss_pct),
        };
        self.cash -= entry.cost_basis() + self.config.commission;
        self.open_trades.push(OpenTrade::new(entry));
        self.open_trades.last()
    }

    /// Close the open position in `ticker` at `price` (before slippage).
    ///
    /// Returns `None` if no such position is open.
    pub fn exit_trade(
        &mut self,
        ticker: &str,
        date: NaiveDate,
        price: f64,
        reason: ExitReason,
    ) -> Option<&ClosedTrade> {
        let idx = self.open_trades.iter().position(|t| t.ticker() == ticker)?;
        let open = self.open_trades.remove(idx);
        let closed = open.close(date, self.config.exit_fill(price), reason);
        self.cash += closed.entry().shares as f64 * closed.exit().exit_price - self.config.commission;
        self.closed_trades.push(closed);
        self.closed_trades.last()
    }

    /// Apply stop, time and take-profit exits against today's bars.
    ///
    /// Exit decisions are made for every position first and executed after, so
    /// closing one position cannot affect another's decision. Returns the number
    /// of positions closed.
    pub fn update_positions(&mut self, date: NaiveDate, prices: &PriceMap) -> usize {
        let exits: Vec<(String, f64, ExitReason)> = self
            .open_trades
            .iter()
            .filter_map(|trade| {
                let bar = prices.get(trade.ticker())?;
                exit_signal(trade, date, bar)
                    .map(|(price, reason)| (trade.ticker().to_string(), price, reason))
            })
            .collect();

        let count = exits.len();
        for (ticker, price, reason) in exits {
            self.exit_trade(&ticker, date, price, reason);
        }
        count
    }

    /// Cash plus open positions marked at today's close.
    ///
    /// A ticker with no bar in `prices` contributes nothing.
    pub fn portfolio_value(&self, prices: &PriceMap) -> f64 {
        let positions: f64 = self
            .open_trades
            .iter()
            .map(|t| {
                prices
                    .get(t.ticker())
                    .map(|bar| t.market_value(bar.close))
                    .unwrap_or(0.0)
            })
            .sum();
        self.cash + positions
    }

    pub fn record_equity(&mut self, date: NaiveDate, prices: &PriceMap) {
        let equity = self.portfolio_value(prices);
        self.equity_curve.push(EquityPoint {
            date,
            equity,
            cash: self.cash,
            open_positions: self.open_trades.len(),
        });
    }

    /// Summary statistics, `None` before any trade has closed.
    pub fn metrics(&self) -> Option<Metrics> {
        Metrics::compute(
            &self.closed_trades,
            &self.equity_curve,
            self.config.initial_capital,
            self.cash,
        )
    }

    /// Consume the portfolio, yielding the closed trades and the equity curve.
    pub fn into_results(self) -> (Vec<ClosedTrade>, Vec<EquityPoint>) {
        (self.closed_trades, self.equity_curve)
    }
}

/// Exit decision for one position on one bar, in priority order:
/// stop-loss at the stop price, then time exit, then take-profit at the close.
pub fn exit_signal(trade: &OpenTrade, date: NaiveDate, bar: &PriceBar) -> Option<(f64, ExitReason)> {
    let entry = trade.entry();
    if bar.low <= entry.stop_loss_price {
        return Some((entry.stop_loss_price, ExitReason::StopLoss));
    }
    if trade.days_held(date) >= MAX_HOLD_DAYS {
        return Some((bar.close, ExitReason::TimeExit));
    }
    if bar.close >= entry.entry_price * TAKE_PROFIT_MULTIPLE {
        return Some((bar.close, ExitReason::TakeProfit));
    }
    None
}
