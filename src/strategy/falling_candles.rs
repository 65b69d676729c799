use crate::config::FallingCandlesParams;
use crate::data::Candle;
use crate::portfolio::Position;
use crate::strategy::{falling_run, ExitReason, Strategy, StrategyError};
use tracing::debug;

//falling-candles strategy
//buys after a run of falling candle bodies, holds through a hard stop loss,
//and once the take-profit trigger is touched waits for a streak of red candles
//(or, when configured, a trailing-stop break) before selling
#[derive(Debug, Clone)]
pub struct FallingCandlesStrategy {
    params: FallingCandlesParams,
}

impl FallingCandlesStrategy {
    pub fn new(params: FallingCandlesParams) -> Self {
        FallingCandlesStrategy { params }
    }
}

impl Strategy for FallingCandlesStrategy {
    fn name(&self) -> &str {
        "falling_candles"
    }

    fn min_bars(&self) -> usize {
        self.params.num_falling + 2
    }

    fn check_buy_signal(&self, window: &[Candle]) -> Result<bool, StrategyError> {
        if window.len() < self.min_bars() {
            return Ok(false);
        }

        Ok(falling_run(
            window,
            self.params.num_falling,
            self.params.allow_one_break,
        ))
    }

    fn check_sell_signal(
        &self,
        window: &[Candle],
        position: &mut Position,
    ) -> Result<Option<ExitReason>, StrategyError> {
        let last = match window.last() {
            Some(candle) => candle,
            None => return Ok(None),
        };

        position.bars_held += 1;

        //hard stop loss on close
        let sl_price = self.get_stop_loss(position.entry_price);
        if last.close <= sl_price {
            return Ok(Some(ExitReason::StopLoss));
        }

        //arm take-profit tracking when the bar high touches the trigger
        let tp_trigger = self.get_take_profit(position.entry_price);
        if !position.tp_armed && last.high >= tp_trigger {
            position.tp_armed = true;
            position.adverse_count = 0;
            position.high_water_mark = last.high;
            debug!(
                instrument = %position.instrument,
                high = last.high,
                "take-profit tracking armed"
            );
        }

        if position.tp_armed {
            //the floor rises with every new high after arming
            if last.high > position.high_water_mark {
                position.high_water_mark = last.high;
            }

            //trailing stop, only when a trailing percentage is configured
            if let Some(trail_perc) = self.params.trailing_stop_perc {
                let floor = position.high_water_mark * (1.0 - trail_perc / 100.0);
                if last.close <= floor {
                    return Ok(Some(ExitReason::TrailingStop));
                }
            }

            //red-candle streak take profit
            if last.is_red() {
                position.adverse_count += 1;
            } else {
                position.adverse_count = 0;
            }

            if position.adverse_count >= self.params.red_candles_to_sell {
                return Ok(Some(ExitReason::TakeProfit));
            }
        }

        Ok(None)
    }

    fn get_stop_loss(&self, entry_price: f64) -> f64 {
        entry_price * (1.0 - self.params.stop_loss_perc / 100.0)
    }

    fn get_take_profit(&self, entry_price: f64) -> f64 {
        entry_price * (1.0 + self.params.take_profit_perc / 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn strategy() -> FallingCandlesStrategy {
        FallingCandlesStrategy::new(FallingCandlesParams {
            num_falling: 6,
            allow_one_break: false,
            take_profit_perc: 12.0,
            stop_loss_perc: 5.0,
            red_candles_to_sell: 3,
            trailing_stop_perc: None,
        })
    }

    fn position(entry_price: f64) -> Position {
        Position::open(
            "btcusdt".to_string(),
            "falling_candles".to_string(),
            Utc.with_ymd_and_hms(2025, 10, 1, 0, 0, 0).unwrap(),
            entry_price,
            1.0,
            0,
        )
    }

    fn mids(values: &[f64]) -> Vec<Candle> {
        crate::strategy::testutil::candles_with_mids(values)
    }

    #[test]
    fn six_falling_bars_fire_the_buy_signal() {
        let strategy = strategy();

        //6 falling transitions at the newest end of an 8-candle window
        let window = mids(&[114.0, 112.0, 110.0, 108.0, 106.0, 104.0, 102.0, 100.0]);
        assert!(strategy.check_buy_signal(&window).unwrap());
    }

    #[test]
    fn five_falling_bars_do_not_fire() {
        let strategy = strategy();

        //only 5 falling transitions, the sixth-back candle rises
        let window = mids(&[111.0, 109.0, 110.0, 108.0, 106.0, 104.0, 102.0, 100.0]);
        assert!(!strategy.check_buy_signal(&window).unwrap());
    }

    #[test]
    fn short_window_returns_false_not_error() {
        let strategy = strategy();
        let window = mids(&[102.0, 100.0]);
        assert!(!strategy.check_buy_signal(&window).unwrap());
    }

    #[test]
    fn stop_loss_and_take_profit_bracket_the_entry() {
        let strategy = strategy();
        assert_eq!(strategy.get_stop_loss(100.0), 95.0);
        assert!((strategy.get_take_profit(100.0) - 112.0).abs() < 1e-9);
        assert!(strategy.get_stop_loss(100.0) < 100.0);
        assert!(strategy.get_take_profit(100.0) > 100.0);
    }

    #[test]
    fn close_at_stop_loss_fires() {
        let strategy = strategy();
        let mut pos = position(100.0);
        let window = mids(&[100.0, 94.0]);

        let reason = strategy.check_sell_signal(&window, &mut pos).unwrap();
        assert_eq!(reason, Some(ExitReason::StopLoss));
    }

    #[test]
    fn take_profit_arms_then_waits_for_red_streak() {
        let strategy = strategy();
        let mut pos = position(100.0);
        let base = Utc.with_ymd_and_hms(2025, 10, 1, 0, 0, 0).unwrap();

        //high touches the 112 trigger, green close
        let arming = vec![Candle::new_unchecked(base, 110.0, 113.0, 109.0, 111.0, 1000.0)];
        assert_eq!(strategy.check_sell_signal(&arming, &mut pos).unwrap(), None);
        assert!(pos.tp_armed);
        assert_eq!(pos.adverse_count, 0);

        //three consecutive red candles after arming
        let red = vec![Candle::new_unchecked(base, 111.0, 112.0, 108.0, 109.0, 1000.0)];
        assert_eq!(strategy.check_sell_signal(&red, &mut pos).unwrap(), None);
        assert_eq!(strategy.check_sell_signal(&red, &mut pos).unwrap(), None);
        let reason = strategy.check_sell_signal(&red, &mut pos).unwrap();
        assert_eq!(reason, Some(ExitReason::TakeProfit));
        assert_eq!(pos.adverse_count, 3);
    }

    #[test]
    fn green_candle_resets_the_red_streak() {
        let strategy = strategy();
        let mut pos = position(100.0);
        pos.tp_armed = true;
        pos.adverse_count = 2;
        pos.high_water_mark = 113.0;
        let base = Utc.with_ymd_and_hms(2025, 10, 1, 0, 0, 0).unwrap();

        let green = vec![Candle::new_unchecked(base, 109.0, 112.0, 108.0, 111.0, 1000.0)];
        assert_eq!(strategy.check_sell_signal(&green, &mut pos).unwrap(), None);
        assert_eq!(pos.adverse_count, 0);
    }

    #[test]
    fn trailing_stop_tracks_the_high_water_mark() {
        let mut params = strategy().params;
        params.trailing_stop_perc = Some(3.0);
        let strategy = FallingCandlesStrategy::new(params);
        let mut pos = position(100.0);
        pos.tp_armed = true;
        pos.high_water_mark = 115.0;
        let base = Utc.with_ymd_and_hms(2025, 10, 1, 0, 0, 0).unwrap();

        //new high raises the floor
        let higher = vec![Candle::new_unchecked(base, 116.0, 120.0, 115.0, 118.0, 1000.0)];
        assert_eq!(strategy.check_sell_signal(&higher, &mut pos).unwrap(), None);
        assert_eq!(pos.high_water_mark, 120.0);

        //close at 3% below the 120 mark breaks the floor
        let breaker = vec![Candle::new_unchecked(base, 118.0, 118.5, 116.0, 116.4, 1000.0)];
        let reason = strategy.check_sell_signal(&breaker, &mut pos).unwrap();
        assert_eq!(reason, Some(ExitReason::TrailingStop));
    }
}
