//! Trade simulation: sizing, exits, cash accounting and summary statistics.

pub mod config;
pub mod metrics;
pub mod portfolio;

pub use config::SimulatorConfig;
pub use metrics::Metrics;
pub use portfolio::{exit_signal, EquityPoint, Portfolio, MAX_HOLD_DAYS, MIN_POSITION_DOLLARS, TAKE_PROFIT_MULTIPLE};
