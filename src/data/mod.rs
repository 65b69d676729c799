pub mod candle;
pub mod loader;

pub use candle::{Candle, CandleError};
pub use loader::{build_windows, CandleSource, CsvCandleSource};
