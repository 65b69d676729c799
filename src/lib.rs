//a Rust-based backtesting engine for rule-based crypto spot strategies

pub mod config;
pub mod data;
pub mod engine;
pub mod metrics;
pub mod portfolio;
pub mod strategy;
pub mod window;

//prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{
        BacktestConfig, ConfigError, FallingCandlesParams, RedCandlesParams, ScanPolicy,
        StrategyParams, StrategyType,
    };
    pub use crate::data::{build_windows, Candle, CandleSource, CsvCandleSource};
    pub use crate::engine::BacktestEngine;
    pub use crate::metrics::{BacktestReport, EquityPoint, TradeRecord};
    pub use crate::portfolio::Position;
    pub use crate::strategy::{
        falling_candles::FallingCandlesStrategy, red_candles::RedCandlesSequenceStrategy,
        ExitReason, Strategy,
    };
    pub use crate::window::SlidingWindow;
}
