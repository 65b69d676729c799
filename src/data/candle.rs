use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CandleError {
    #[error("Invalid OHLC values: high ({high}) < low ({low})")]
    InvalidHighLow { high: f64, low: f64 },
    #[error("Invalid OHLC values: close ({close}) outside high-low range [{low}, {high}]")]
    InvalidClose { close: f64, high: f64, low: f64 },
    #[error("Invalid OHLC values: open ({open}) outside high-low range [{low}, {high}]")]
    InvalidOpen { open: f64, high: f64, low: f64 },
    #[error("Negative volume: {0}")]
    NegativeVolume(f64),
}

//one ohlcv candlestick for a fixed time bucket of a single instrument
//moving averages are optional precomputed columns carried through from the store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    #[serde(default)]
    pub ma10: Option<f64>,
    #[serde(default)]
    pub ma20: Option<f64>,
    #[serde(default)]
    pub ma50: Option<f64>,
    #[serde(default)]
    pub ma100: Option<f64>,
    #[serde(default)]
    pub ma200: Option<f64>,
}

impl Candle {
    //creates a new Candle with validation
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Result<Self, CandleError> {
        //validate high >= low
        if high < low {
            return Err(CandleError::InvalidHighLow { high, low });
        }

        //validate close within [low, high]
        if close < low || close > high {
            return Err(CandleError::InvalidClose { close, high, low });
        }

        //validate open within [low, high]
        if open < low || open > high {
            return Err(CandleError::InvalidOpen { open, high, low });
        }

        //validate non-negative volume
        if volume < 0.0 {
            return Err(CandleError::NegativeVolume(volume));
        }

        Ok(Candle {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            ma10: None,
            ma20: None,
            ma50: None,
            ma100: None,
            ma200: None,
        })
    }

    //creates a Candle without validation
    pub fn new_unchecked(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Self {
        Candle {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
            ma10: None,
            ma20: None,
            ma50: None,
            ma100: None,
            ma200: None,
        }
    }

    //returns the body mid ((open + close) / 2)
    //the falling-run rules compare candle bodies, not wicks
    pub fn body_mid(&self) -> f64 {
        (self.open + self.close) / 2.0
    }

    //returns true for a red candle (close below open)
    pub fn is_red(&self) -> bool {
        self.close < self.open
    }

    //returns the range (high - low)
    pub fn range(&self) -> f64 {
        self.high - self.low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn valid_candle_passes_validation() {
        let candle = Candle::new(ts(), 10.0, 12.0, 9.0, 11.0, 100.0).unwrap();
        assert_eq!(candle.body_mid(), 10.5);
        assert!(!candle.is_red());
        assert_eq!(candle.range(), 3.0);
    }

    #[test]
    fn high_below_low_is_rejected() {
        let err = Candle::new(ts(), 10.0, 9.0, 12.0, 10.0, 100.0).unwrap_err();
        assert!(matches!(err, CandleError::InvalidHighLow { .. }));
    }

    #[test]
    fn close_outside_range_is_rejected() {
        let err = Candle::new(ts(), 10.0, 12.0, 9.0, 13.0, 100.0).unwrap_err();
        assert!(matches!(err, CandleError::InvalidClose { .. }));
    }

    #[test]
    fn negative_volume_is_rejected() {
        let err = Candle::new(ts(), 10.0, 12.0, 9.0, 11.0, -1.0).unwrap_err();
        assert!(matches!(err, CandleError::NegativeVolume(_)));
    }

    #[test]
    fn red_candle_detected() {
        let candle = Candle::new(ts(), 11.0, 12.0, 9.0, 10.0, 100.0).unwrap();
        assert!(candle.is_red());
    }
}
