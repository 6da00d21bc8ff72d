//! Serializable backtest configuration.
//!
//! A config is plain data: universe, date range, which patterns may trigger
//! entries, and the simulator knobs. It round-trips through TOML and hashes to
//! a stable run id.

use chrono::NaiveDate;
use patternlab_core::patterns::{ParsePatternError, Pattern};
use patternlab_core::simulator::SimulatorConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Content hash of a [`BacktestConfig`].
pub type RunId = String;

/// Errors from loading or validating a config.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config TOML: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid value for '{field}': {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("{0}")]
    UnknownPattern(#[from] ParsePatternError),

    #[error("start date {start} is after end date {end}")]
    InvalidDateRange { start: NaiveDate, end: NaiveDate },
}

/// Which detectors may produce entries.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "PatternSpec", into = "PatternSpec")]
pub enum PatternFilter {
    #[default]
    All,
    Only(Vec<Pattern>),
}

impl PatternFilter {
    /// Parse a list of names; `"all"` anywhere in the list means every pattern.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self, ConfigError> {
        if names.iter().any(|n| n.as_ref().trim().eq_ignore_ascii_case("all")) {
            return Ok(PatternFilter::All);
        }
        let patterns = names
            .iter()
            .map(|n| n.as_ref().parse::<Pattern>())
            .collect::<Result<Vec<_>, _>>()?;
        Ok(PatternFilter::Only(patterns))
    }

    pub fn allows(&self, pattern: Pattern) -> bool {
        match self {
            PatternFilter::All => true,
            PatternFilter::Only(list) => list.contains(&pattern),
        }
    }

    /// Allowed patterns in detector order, without duplicates.
    pub fn patterns(&self) -> Vec<Pattern> {
        Pattern::ALL.into_iter().filter(|p| self.allows(*p)).collect()
    }
}

/// On-disk shape of `patterns`: a keyword or a list of names.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum PatternSpec {
    Keyword(String),
    List(Vec<String>),
}

impl TryFrom<PatternSpec> for PatternFilter {
    type Error = ConfigError;

    fn try_from(spec: PatternSpec) -> Result<Self, Self::Error> {
        match spec {
            PatternSpec::Keyword(name) => PatternFilter::from_names(&[name]),
            PatternSpec::List(names) => PatternFilter::from_names(&names),
        }
    }
}

impl From<PatternFilter> for PatternSpec {
    fn from(filter: PatternFilter) -> Self {
        match filter {
            PatternFilter::All => PatternSpec::Keyword("all".into()),
            PatternFilter::Only(list) => {
                PatternSpec::List(list.iter().map(|p| p.key().to_string()).collect())
            }
        }
    }
}

fn default_parallel_detection() -> bool {
    true
}

/// Everything needed to reproduce a backtest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// Universe, in tie-break order: earlier tickers get first claim on capacity.
    pub tickers: Vec<String>,
    /// Inclusive.
    pub start_date: NaiveDate,
    /// Inclusive.
    pub end_date: NaiveDate,
    #[serde(default)]
    pub patterns: PatternFilter,
    /// Run detectors for different tickers on the rayon pool.
    #[serde(default = "default_parallel_detection")]
    pub parallel_detection: bool,
    #[serde(default)]
    pub simulator: SimulatorConfig,
}

impl BacktestConfig {
    pub fn new(tickers: Vec<String>, start_date: NaiveDate, end_date: NaiveDate) -> Self {
        Self {
            tickers,
            start_date,
            end_date,
            patterns: PatternFilter::All,
            parallel_detection: default_parallel_detection(),
            simulator: SimulatorConfig::default(),
        }
    }

    pub fn with_patterns(mut self, patterns: PatternFilter) -> Self {
        self.patterns = patterns;
        self
    }

    pub fn with_simulator(mut self, simulator: SimulatorConfig) -> Self {
        self.simulator = simulator;
        self
    }

    pub fn with_parallel_detection(mut self, parallel: bool) -> Self {
        self.parallel_detection = parallel;
        self
    }

    /// Parse and validate.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    pub fn to_toml(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tickers.is_empty() {
            return Err(invalid("tickers", "at least one ticker is required"));
        }
        for (i, ticker) in self.tickers.iter().enumerate() {
            if ticker.trim().is_empty() {
                return Err(invalid("tickers", "ticker symbols must not be blank"));
            }
            if self.tickers[..i].contains(ticker) {
                return Err(invalid("tickers", format!("'{ticker}' is listed twice")));
            }
        }
        if self.start_date > self.end_date {
            return Err(ConfigError::InvalidDateRange {
                start: self.start_date,
                end: self.end_date,
            });
        }
        if let PatternFilter::Only(list) = &self.patterns {
            if list.is_empty() {
                return Err(invalid("patterns", "at least one pattern is required"));
            }
        }

        let sim = &self.simulator;
        if !(sim.initial_capital.is_finite() && sim.initial_capital > 0.0) {
            return Err(invalid("simulator.initial_capital", "must be positive"));
        }
        if !(sim.max_position_pct > 0.0 && sim.max_position_pct <= 1.0) {
            return Err(invalid("simulator.max_position_pct", "must be in (0, 1]"));
        }
        if sim.max_positions == 0 {
            return Err(invalid("simulator.max_positions", "must be at least 1"));
        }
        if !(sim.stop_loss_pct > 0.0 && sim.stop_loss_pct < 1.0) {
            return Err(invalid("simulator.stop_loss_pct", "must be in (0, 1)"));
        }
        if !(sim.commission.is_finite() && sim.commission >= 0.0) {
            return Err(invalid("simulator.commission", "must not be negative"));
        }
        if !(sim.slippage_pct >= 0.0 && sim.slippage_pct < 1.0) {
            return Err(invalid("simulator.slippage_pct", "must be in [0, 1)"));
        }
        Ok(())
    }

    /// BLAKE3 hash of the config's JSON form. Identical configs share an id.
    pub fn run_id(&self) -> RunId {
        // Plain structs with string keys always serialize.
        let json = serde_json::to_vec(self).unwrap_or_default();
        blake3::hash(&json).to_hex().to_string()
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn sample() -> BacktestConfig {
        BacktestConfig::new(
            vec!["AAPL".into(), "MSFT".into()],
            d(2023, 1, 1),
            d(2024, 1, 1),
        )
    }

    const FULL_TOML: &str = r#"
tickers = ["NVDA", "AMD"]
start_date = "2023-01-01"
end_date = "2024-01-01"
patterns = ["cup_with_handle", "Pocket Pivot"]
parallel_detection = false

[simulator]
initial_capital = 50000.0
max_positions = 5
stop_loss_pct = 0.07
"#;

    #[test]
    fn parses_full_toml() {
        let config = BacktestConfig::from_toml(FULL_TOML).unwrap();
        assert_eq!(config.tickers, vec!["NVDA", "AMD"]);
        assert_eq!(config.start_date, d(2023, 1, 1));
        assert!(!config.parallel_detection);
        assert_eq!(
            config.patterns,
            PatternFilter::Only(vec![Pattern::CupWithHandle, Pattern::PocketPivot])
        );
        assert_eq!(config.simulator.initial_capital, 50_000.0);
        assert_eq!(config.simulator.max_positions, 5);
        // Unspecified simulator fields keep their defaults.
        assert_eq!(config.simulator.max_position_pct, 0.10);
        assert_eq!(config.simulator.slippage_pct, 0.001);
    }

    #[test]
    fn minimal_toml_uses_defaults() {
        let config = BacktestConfig::from_toml(
            r#"
tickers = ["SPY"]
start_date = "2023-01-01"
end_date = "2023-12-31"
"#,
        )
        .unwrap();
        assert_eq!(config.patterns, PatternFilter::All);
        assert!(config.parallel_detection);
        assert_eq!(config.simulator, SimulatorConfig::default());
    }

    #[test]
    fn patterns_keyword_all() {
        let config = BacktestConfig::from_toml(
            r#"
tickers = ["SPY"]
start_date = "2023-01-01"
end_date = "2023-12-31"
patterns = "all"
"#,
        )
        .unwrap();
        assert_eq!(config.patterns, PatternFilter::All);
    }

    #[test]
    fn list_containing_all_means_all() {
        let filter = PatternFilter::from_names(&["flat_base", "ALL"]).unwrap();
        assert_eq!(filter, PatternFilter::All);
    }

    #[test]
    fn unknown_pattern_is_rejected() {
        let err = PatternFilter::from_names(&["head_and_shoulders"]).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownPattern(_)));

        let toml_err = BacktestConfig::from_toml(
            r#"
tickers = ["SPY"]
start_date = "2023-01-01"
end_date = "2023-12-31"
patterns = ["head_and_shoulders"]
"#,
        )
        .unwrap_err();
        assert!(matches!(toml_err, ConfigError::Parse(_)));
    }

    #[test]
    fn filter_patterns_follow_detector_order() {
        let filter =
            PatternFilter::Only(vec![Pattern::PocketPivot, Pattern::FlatBase, Pattern::PocketPivot]);
        assert_eq!(filter.patterns(), vec![Pattern::FlatBase, Pattern::PocketPivot]);
        assert!(filter.allows(Pattern::FlatBase));
        assert!(!filter.allows(Pattern::HighTightFlag));
        assert_eq!(PatternFilter::All.patterns(), Pattern::ALL.to_vec());
    }

    #[test]
    fn toml_roundtrip() {
        let config = sample().with_patterns(PatternFilter::Only(vec![Pattern::HighTightFlag]));
        let text = config.to_toml().unwrap();
        let back = BacktestConfig::from_toml(&text).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn inverted_dates_rejected() {
        let mut config = sample();
        config.start_date = d(2025, 1, 1);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidDateRange { .. })
        ));
    }

    #[test]
    fn invalid_simulator_values_rejected() {
        let cases: Vec<(&str, fn(&mut SimulatorConfig))> = vec![
            ("simulator.initial_capital", |s: &mut SimulatorConfig| s.initial_capital = 0.0),
            ("simulator.max_position_pct", |s: &mut SimulatorConfig| s.max_position_pct = 1.5),
            ("simulator.max_positions", |s: &mut SimulatorConfig| s.max_positions = 0),
            ("simulator.stop_loss_pct", |s: &mut SimulatorConfig| s.stop_loss_pct = 0.0),
            ("simulator.commission", |s: &mut SimulatorConfig| s.commission = -1.0),
            ("simulator.slippage_pct", |s: &mut SimulatorConfig| s.slippage_pct = 1.0),
        ];
        for (expected, mutate) in cases {
            let mut config = sample();
            mutate(&mut config.simulator);
            match config.validate() {
                Err(ConfigError::InvalidValue { field, .. }) => assert_eq!(field, expected),
                other => panic!("expected InvalidValue for {expected}, got {other:?}"),
            }
        }
    }

    #[test]
    fn duplicate_and_empty_universe_rejected() {
        let mut config = sample();
        config.tickers.push("AAPL".into());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "tickers", .. })
        ));

        config.tickers.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn empty_pattern_list_rejected() {
        let config = sample().with_patterns(PatternFilter::Only(vec![]));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "patterns", .. })
        ));
    }

    #[test]
    fn run_id_deterministic() {
        assert_eq!(sample().run_id(), sample().run_id());
        assert_eq!(sample().run_id().len(), 64);
    }

    #[test]
    fn run_id_changes_with_params() {
        let a = sample();
        let mut b = sample();
        b.simulator.stop_loss_pct = 0.05;
        assert_ne!(a.run_id(), b.run_id());

        let c = sample().with_parallel_detection(false);
        assert_ne!(a.run_id(), c.run_id());
    }

    #[test]
    fn from_file_reads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backtest.toml");
        std::fs::write(&path, FULL_TOML).unwrap();
        let config = BacktestConfig::from_file(&path).unwrap();
        assert_eq!(config.tickers.len(), 2);
    }

    #[test]
    fn from_missing_file_is_io_error() {
        let err = BacktestConfig::from_file("/nonexistent/backtest.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
