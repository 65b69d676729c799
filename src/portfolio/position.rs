use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

//the engine's single currently-open trade
//economic fields are written once at entry, the tracking fields below the
//divider belong to the owning strategy's sell check and are mutated nowhere else
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    //instrument identifier (eg btcusdt)
    pub instrument: String,

    //identifier of the owning strategy
    pub strategy: String,

    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,

    //units bought, capital / entry_price (all-in sizing)
    pub quantity: f64,

    //absolute index of the entry candle in the instrument's full series
    pub entry_bar_index: usize,

    //strategy-tracking state
    //take-profit trigger touched, exit tracking armed
    pub tp_armed: bool,

    //consecutive adverse (red) candles since arming
    pub adverse_count: u32,

    //sell checks survived since entry, drives stagnation exits
    pub bars_held: u32,

    //highest price seen since arming, floor for trailing stops
    pub high_water_mark: f64,
}

impl Position {
    //opens a position with all tracking state reset
    pub fn open(
        instrument: String,
        strategy: String,
        entry_time: DateTime<Utc>,
        entry_price: f64,
        quantity: f64,
        entry_bar_index: usize,
    ) -> Self {
        Position {
            instrument,
            strategy,
            entry_time,
            entry_price,
            quantity,
            entry_bar_index,
            tp_armed: false,
            adverse_count: 0,
            bars_held: 0,
            high_water_mark: entry_price,
        }
    }

    //marked-to-market value at a price
    pub fn value_at(&self, price: f64) -> f64 {
        self.quantity * price
    }

    //percentage return of an exit at the given price
    pub fn profit_perc(&self, exit_price: f64) -> f64 {
        (exit_price - self.entry_price) / self.entry_price * 100.0
    }

    //absolute return of an exit at the given price
    pub fn profit_abs(&self, exit_price: f64) -> f64 {
        self.quantity * (exit_price - self.entry_price)
    }
}
