//! PatternLab Core: price data types, chart-pattern detectors and the trade simulator.
//!
//! This crate is pure computation with no I/O:
//! - Domain types (bars, price histories, open and closed trades)
//! - Four base-pattern detectors over a no-lookahead bar window
//! - Portfolio with position sizing, stop/time/take-profit exits and an equity curve
//! - Summary metrics over the closed-trade ledger

pub mod domain;
pub mod patterns;
pub mod simulator;

pub use domain::{ClosedTrade, ExitReason, OpenTrade, PriceBar, PriceHistory, PriceMap, Trade};
pub use patterns::{detect_all, Pattern, PatternSignal};
pub use simulator::{EquityPoint, Metrics, Portfolio, SimulatorConfig};
