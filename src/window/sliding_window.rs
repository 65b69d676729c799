use crate::data::Candle;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum WindowError {
    #[error("Cannot build a sliding window from an empty candle set")]
    EmptyData,
    #[error("Invalid window size: {0} (must be at least 1)")]
    InvalidWindowSize(usize),
}

//in-memory replacement for the per-step "fetch last K candles up to time T" query
//holds one instrument's full candle history for the backtest range, built once,
//read-only afterwards
pub struct SlidingWindow {
    candles: Vec<Candle>,
    window_size: usize,
}

impl SlidingWindow {
    //builds a window over the full candle history
    //input is sorted by timestamp and de-duplicated (first candle per timestamp wins)
    pub fn new(mut candles: Vec<Candle>, window_size: usize) -> Result<Self, WindowError> {
        if candles.is_empty() {
            return Err(WindowError::EmptyData);
        }
        if window_size == 0 {
            return Err(WindowError::InvalidWindowSize(window_size));
        }

        candles.sort_by(|a, b| a.timestamp.cmp(&b.timestamp));
        candles.dedup_by(|next, prev| next.timestamp == prev.timestamp);

        Ok(SlidingWindow {
            candles,
            window_size,
        })
    }

    //returns the trailing slice of up to window_size candles with timestamp <= t
    //empty slice when no candle qualifies, partial slice when fewer than
    //window_size qualify - callers enforce their own minimum bar counts
    pub fn query_at(&self, timestamp: DateTime<Utc>) -> &[Candle] {
        let end = self
            .candles
            .partition_point(|candle| candle.timestamp <= timestamp);

        if end == 0 {
            return &[];
        }

        let start = end.saturating_sub(self.window_size);
        &self.candles[start..end]
    }

    //returns the absolute index (into the full series) of the last candle <= t
    pub fn index_at(&self, timestamp: DateTime<Utc>) -> Option<usize> {
        let end = self
            .candles
            .partition_point(|candle| candle.timestamp <= timestamp);
        end.checked_sub(1)
    }

    //returns the close of the last candle <= t
    pub fn close_at(&self, timestamp: DateTime<Utc>) -> Option<f64> {
        self.query_at(timestamp).last().map(|candle| candle.close)
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn window_size(&self) -> usize {
        self.window_size
    }
}
