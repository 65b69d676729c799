pub mod backtest_config;

pub use backtest_config::{
    BacktestConfig, ConfigError, FallingCandlesParams, RedCandlesParams, ScanPolicy,
    StrategyParams, StrategyType,
};
