//! Simulator knobs: capital, sizing, risk and friction.

use serde::{Deserialize, Serialize};

/// Parameters that stay fixed for a whole simulation.
///
/// Percentages are fractions (`0.10` = 10%). Missing fields in a config file
/// fall back to [`SimulatorConfig::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulatorConfig {
    pub initial_capital: f64,
    /// Share of current cash allotted to each new position.
    pub max_position_pct: f64,
    pub max_positions: usize,
    pub stop_loss_pct: f64,
    /// Flat dollars charged on every fill.
    pub commission: f64,
    /// Adverse price move applied to every fill, both sides.
    pub slippage_pct: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            initial_capital: 100_000.0,
            max_position_pct: 0.10,
            max_positions: 10,
            stop_loss_pct: 0.08,
            commission: 0.0,
            slippage_pct: 0.001,
        }
    }
}

impl SimulatorConfig {
    /// Fill price paid when buying at `price`.
    pub fn entry_fill(&self, price: f64) -> f64 {
        price * (1.0 + self.slippage_pct)
    }

    /// Fill price received when selling at `price`.
    pub fn exit_fill(&self, price: f64) -> f64 {
        price * (1.0 - self.slippage_pct)
    }
}
