//! Domain types for PatternLab

pub mod bar;
pub mod trade;

pub use bar::{PriceBar, PriceHistory, PriceMap};
pub use trade::{ClosedTrade, ExitReason, OpenTrade, Trade, TradeEntry, TradeExit};
