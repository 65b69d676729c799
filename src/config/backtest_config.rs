use crate::strategy::{
    falling_candles::FallingCandlesStrategy, red_candles::RedCandlesSequenceStrategy, Strategy,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Initial capital must be positive, got {0}")]
    NonPositiveCapital(f64),
    #[error("Backtest period is empty: start {start} is not before end {end}")]
    EmptyPeriod {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },
    #[error("Step interval must be at least 1 hour, got {0}")]
    InvalidInterval(i64),
    #[error("Window size must be at least 1, got {0}")]
    InvalidWindowSize(usize),
    #[error("No instruments configured")]
    NoInstruments,
    #[error("No market data loaded for any configured instrument")]
    NoMarketData,
    #[error("Unknown strategy: {0}")]
    UnknownStrategy(String),
}

//strategy identifier, the closed registry the configuration resolves through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyType {
    FallingCandles,
    RedCandlesSequence,
}

impl StrategyType {
    //parse strategy type from string
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "falling" | "falling_candles" => Some(StrategyType::FallingCandles),
            "red" | "red_candles" | "red_candles_sequence" => {
                Some(StrategyType::RedCandlesSequence)
            }
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyType::FallingCandles => "falling_candles",
            StrategyType::RedCandlesSequence => "red_candles_sequence",
        }
    }
}

//falling-candles strategy parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallingCandlesParams {
    pub num_falling: usize,
    pub allow_one_break: bool,
    pub take_profit_perc: f64,
    pub stop_loss_perc: f64,
    pub red_candles_to_sell: u32,
    //optional trailing stop below the post-arm high-water mark
    #[serde(default)]
    pub trailing_stop_perc: Option<f64>,
}

impl Default for FallingCandlesParams {
    fn default() -> Self {
        FallingCandlesParams {
            num_falling: 6,
            allow_one_break: true,
            take_profit_perc: 12.0,
            stop_loss_perc: 5.0,
            red_candles_to_sell: 3,
            trailing_stop_perc: None,
        }
    }
}

//red-candles sequence strategy parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedCandlesParams {
    pub bars_count: usize,
    pub total_drop_perc: f64,
    pub tp_perc: f64,
    pub sl_perc: f64,
    pub stagnation_bars: u32,
}

impl Default for RedCandlesParams {
    fn default() -> Self {
        RedCandlesParams {
            bars_count: 5,
            total_drop_perc: 5.0,
            tp_perc: 5.0,
            sl_perc: 50.0,
            stagnation_bars: 60,
        }
    }
}

//strategy-specific parameters, tagged by strategy identifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StrategyParams {
    FallingCandles(FallingCandlesParams),
    RedCandlesSequence(RedCandlesParams),
}

impl StrategyParams {
    //resolves the configured strategy once at setup
    pub fn build(&self) -> Box<dyn Strategy> {
        match self {
            StrategyParams::FallingCandles(params) => {
                Box::new(FallingCandlesStrategy::new(params.clone()))
            }
            StrategyParams::RedCandlesSequence(params) => {
                Box::new(RedCandlesSequenceStrategy::new(params.clone()))
            }
        }
    }

    pub fn strategy_type(&self) -> StrategyType {
        match self {
            StrategyParams::FallingCandles(_) => StrategyType::FallingCandles,
            StrategyParams::RedCandlesSequence(_) => StrategyType::RedCandlesSequence,
        }
    }
}

//how the flat-state opportunity scan picks among simultaneously-qualifying instruments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ScanPolicy {
    //first qualifying instrument in configured order wins
    #[default]
    FirstMatch,
    //scan all qualifying instruments, take the one with the deepest
    //body-mid decline over the strategy lookback
    DeepestDrop,
}

//complete backtest configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,

    //simulation step in hours
    pub interval_hours: i64,

    //candles served per window query
    pub window_size: usize,

    //ordered instrument list, fixes the opportunity-scan iteration order
    pub instruments: Vec<String>,

    pub scan_policy: ScanPolicy,
    pub strategy: StrategyParams,
}

impl BacktestConfig {
    //validates the fatal-before-the-loop conditions
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.initial_capital <= 0.0 {
            return Err(ConfigError::NonPositiveCapital(self.initial_capital));
        }
        if self.start >= self.end {
            return Err(ConfigError::EmptyPeriod {
                start: self.start,
                end: self.end,
            });
        }
        if self.interval_hours < 1 {
            return Err(ConfigError::InvalidInterval(self.interval_hours));
        }
        if self.window_size == 0 {
            return Err(ConfigError::InvalidWindowSize(self.window_size));
        }
        if self.instruments.is_empty() {
            return Err(ConfigError::NoInstruments);
        }
        Ok(())
    }

    //load configuration from a JSON file
    pub fn from_json_file(path: &PathBuf) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: BacktestConfig = serde_json::from_str(&contents)?;
        Ok(config)
    }

    //save configuration to a JSON file
    pub fn to_json_file(&self, path: &PathBuf) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            initial_capital: 100.0,
            start: "2025-01-01T00:00:00Z".parse().unwrap(),
            end: "2025-12-31T23:59:59Z".parse().unwrap(),
            interval_hours: 1,
            window_size: 50,
            instruments: Vec::new(),
            scan_policy: ScanPolicy::FirstMatch,
            strategy: StrategyParams::FallingCandles(FallingCandlesParams::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> BacktestConfig {
        BacktestConfig {
            instruments: vec!["btcusdt".to_string()],
            ..BacktestConfig::default()
        }
    }

    #[test]
    fn default_config_with_instruments_validates() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn zero_capital_rejected() {
        let mut cfg = config();
        cfg.initial_capital = 0.0;
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::NonPositiveCapital(_))
        ));
    }

    #[test]
    fn inverted_period_rejected() {
        let mut cfg = config();
        cfg.end = cfg.start;
        assert!(matches!(cfg.validate(), Err(ConfigError::EmptyPeriod { .. })));
    }

    #[test]
    fn zero_interval_rejected() {
        let mut cfg = config();
        cfg.interval_hours = 0;
        assert!(matches!(cfg.validate(), Err(ConfigError::InvalidInterval(0))));
    }

    #[test]
    fn empty_instrument_list_rejected() {
        let mut cfg = config();
        cfg.instruments.clear();
        assert!(matches!(cfg.validate(), Err(ConfigError::NoInstruments)));
    }

    #[test]
    fn strategy_type_parsing() {
        assert_eq!(
            StrategyType::parse("falling"),
            Some(StrategyType::FallingCandles)
        );
        assert_eq!(
            StrategyType::parse("RED"),
            Some(StrategyType::RedCandlesSequence)
        );
        assert_eq!(StrategyType::parse("sma"), None);
    }

    #[test]
    fn registry_builds_the_configured_strategy() {
        let strategy = StrategyParams::FallingCandles(FallingCandlesParams::default()).build();
        assert_eq!(strategy.name(), "falling_candles");

        let strategy = StrategyParams::RedCandlesSequence(RedCandlesParams::default()).build();
        assert_eq!(strategy.name(), "red_candles_sequence");
    }

    #[test]
    fn config_json_round_trip() {
        let cfg = config();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: BacktestConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.instruments, cfg.instruments);
        assert_eq!(back.scan_policy, ScanPolicy::FirstMatch);
    }
}
