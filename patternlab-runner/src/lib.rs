//! PatternLab Runner: backtest configuration, data loading and orchestration.
//!
//! This crate builds on `patternlab-core` to provide:
//! - TOML backtest configuration with validation and a content-hash run id
//! - Price-history providers (in-memory, CSV directory) and dataset hashing
//! - The day-by-day backtest loop with optional parallel detection
//! - Serializable results with a per-pattern breakdown
//!
//! The runner logs through `tracing` and installs no subscriber.

pub mod breakdown;
pub mod config;
pub mod data_loader;
pub mod result;
pub mod runner;

pub use breakdown::{PatternBreakdown, PatternStats};
pub use config::{BacktestConfig, ConfigError, PatternFilter, RunId};
pub use data_loader::{
    load_histories, CsvDirectoryProvider, InMemoryProvider, LoadError, LoadedData,
    PriceHistoryProvider,
};
pub use result::{BacktestResult, SignalLogEntry, SCHEMA_VERSION};
pub use runner::{
    run_backtest, run_backtest_from_csv, run_backtest_from_data, simulation_clock, RunError,
    MIN_HISTORY_BARS,
};
