pub mod equity;
pub mod report;

pub use equity::{max_drawdown, step_returns, EquityPoint};
pub use report::{BacktestReport, TradeRecord};
