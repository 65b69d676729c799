pub mod falling_candles;
pub mod red_candles;

use crate::data::Candle;
use crate::portfolio::Position;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

//categorical exit reason attached to every closed trade
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitReason {
    StopLoss,
    TakeProfit,
    TrailingStop,
    Stagnation,
    EndOfBacktest,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ExitReason::StopLoss => "STOP_LOSS",
            ExitReason::TakeProfit => "TAKE_PROFIT",
            ExitReason::TrailingStop => "TRAILING_STOP",
            ExitReason::Stagnation => "STAGNATION",
            ExitReason::EndOfBacktest => "END_OF_BACKTEST",
        };
        f.write_str(label)
    }
}

//a strategy implementation failing during signal evaluation
//the engine absorbs these per instrument per step and treats them as "no signal"
#[derive(Error, Debug)]
pub enum StrategyError {
    #[error("Required indicator {0} missing from candle data")]
    MissingIndicator(&'static str),
    #[error("Non-finite value in candle data: {0}")]
    NonFiniteValue(&'static str),
}

//signal contract the engine evaluates windows through
//buy checks are pure over the window, sell checks may mutate the tracking
//fields of the position they are handed and nothing else
pub trait Strategy: Send {
    fn name(&self) -> &str;

    //minimum bars this strategy needs before its buy signal is meaningful
    fn min_bars(&self) -> usize;

    //true when the window ends on an entry condition
    //returns Ok(false), never an error, when the window is too short
    fn check_buy_signal(&self, window: &[Candle]) -> Result<bool, StrategyError>;

    //evaluated once per step while the position is open
    fn check_sell_signal(
        &self,
        window: &[Candle],
        position: &mut Position,
    ) -> Result<Option<ExitReason>, StrategyError>;

    //stop-loss price for an entry
    fn get_stop_loss(&self, entry_price: f64) -> f64;

    //take-profit trigger price for an entry
    fn get_take_profit(&self, entry_price: f64) -> f64;
}

//helper checking whether the window ends in a run of `num` falling candles
//falling = body mid below the previous candle's body mid
//when allow_break is set, one non-falling candle inside the run is tolerated
pub fn falling_run(window: &[Candle], num: usize, allow_break: bool) -> bool {
    let len = window.len();
    let span = num + usize::from(allow_break);

    let mut falling_count = 0;
    let mut break_used = false;

    for i in 1..=span {
        //need candle i and its predecessor, counted from the newest end
        if i + 1 > len {
            return false;
        }

        let mid_curr = window[len - i].body_mid();
        let mid_prev = window[len - i - 1].body_mid();

        if mid_curr < mid_prev {
            falling_count += 1;
        } else if allow_break && !break_used {
            break_used = true;
        } else {
            return false;
        }
    }

    falling_count >= num
}

//percentage body-mid decline across the last `span` candles of the window
//positive values mean the window fell, None when the window is too short
pub fn body_mid_drop_perc(window: &[Candle], span: usize) -> Option<f64> {
    let len = window.len();
    if span == 0 || len < span + 1 {
        return None;
    }

    let first = window[len - 1 - span].body_mid();
    let last = window[len - 1].body_mid();
    if first == 0.0 {
        return None;
    }

    Some((first - last) / first * 100.0)
}

//test fixtures shared by the strategy and engine tests
#[cfg(test)]
pub(crate) mod testutil {
    use crate::data::Candle;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    //candles whose body mids follow the given sequence, one per hour
    pub(crate) fn candles_with_mids(mids: &[f64]) -> Vec<Candle> {
        let base: DateTime<Utc> = Utc.with_ymd_and_hms(2025, 10, 1, 0, 0, 0).unwrap();
        mids.iter()
            .enumerate()
            .map(|(i, &mid)| {
                //flat bodies so body_mid == open == close
                Candle::new_unchecked(
                    base + Duration::hours(i as i64),
                    mid,
                    mid + 1.0,
                    mid - 1.0,
                    mid,
                    1000.0,
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::testutil::candles_with_mids;
    use super::*;

    #[test]
    fn strict_falling_run_detected() {
        let window = candles_with_mids(&[110.0, 108.0, 106.0, 104.0, 102.0, 100.0, 98.0]);
        assert!(falling_run(&window, 6, false));
    }

    #[test]
    fn run_too_short_is_rejected() {
        let window = candles_with_mids(&[110.0, 108.0, 106.0, 104.0, 102.0, 100.0]);
        assert!(!falling_run(&window, 6, false));
    }

    #[test]
    fn one_break_tolerated_when_allowed() {
        let window =
            candles_with_mids(&[112.0, 110.0, 108.0, 106.0, 107.0, 104.0, 102.0, 100.0]);
        assert!(falling_run(&window, 6, true));
        assert!(!falling_run(&window, 6, false));
    }

    #[test]
    fn two_breaks_rejected() {
        let window =
            candles_with_mids(&[112.0, 110.0, 111.0, 106.0, 107.0, 104.0, 102.0, 100.0]);
        assert!(!falling_run(&window, 6, true));
    }

    #[test]
    fn drop_percentage_over_span() {
        let window = candles_with_mids(&[100.0, 98.0, 96.0, 94.0]);
        let drop = body_mid_drop_perc(&window, 3).unwrap();
        assert!((drop - 6.0).abs() < 1e-9);
    }

    #[test]
    fn exit_reason_labels() {
        assert_eq!(ExitReason::StopLoss.to_string(), "STOP_LOSS");
        assert_eq!(ExitReason::EndOfBacktest.to_string(), "END_OF_BACKTEST");
    }
}
