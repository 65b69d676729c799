use crate::config::RedCandlesParams;
use crate::data::Candle;
use crate::portfolio::Position;
use crate::strategy::{ExitReason, Strategy, StrategyError};

//red-candles sequence strategy with stagnation exit
//buys the first rising candle after a strict falling body-mid sequence that
//dropped at least total_drop_perc, sells on take profit, stop loss, or after
//stagnation_bars sell checks without either firing
#[derive(Debug, Clone)]
pub struct RedCandlesSequenceStrategy {
    params: RedCandlesParams,
}

impl RedCandlesSequenceStrategy {
    pub fn new(params: RedCandlesParams) -> Self {
        RedCandlesSequenceStrategy { params }
    }
}

impl Strategy for RedCandlesSequenceStrategy {
    fn name(&self) -> &str {
        "red_candles_sequence"
    }

    fn min_bars(&self) -> usize {
        self.params.bars_count + 2
    }

    fn check_buy_signal(&self, window: &[Candle]) -> Result<bool, StrategyError> {
        let len = window.len();
        if len < self.min_bars() {
            return Ok(false);
        }

        //strict falling sequence over bars_count transitions, skipping the
        //newest candle which must turn upward
        for i in 1..=self.params.bars_count {
            let mid_curr = window[len - 1 - i].body_mid();
            let mid_prev = window[len - 2 - i].body_mid();
            if mid_curr >= mid_prev {
                return Ok(false);
            }
        }

        //total decline across the sequence
        let first_mid = window[len - 1 - self.params.bars_count].body_mid();
        let last_mid = window[len - 2].body_mid();
        if first_mid == 0.0 {
            return Err(StrategyError::NonFiniteValue("body mid"));
        }

        let sequence_drop = (first_mid - last_mid) / first_mid * 100.0;
        if sequence_drop < self.params.total_drop_perc {
            return Ok(false);
        }

        //the newest candle must turn upward
        Ok(window[len - 1].body_mid() > window[len - 2].body_mid())
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

        let current_price = last.close;

        if current_price >= self.get_take_profit(position.entry_price) {
            return Ok(Some(ExitReason::TakeProfit));
        }

        if current_price <= self.get_stop_loss(position.entry_price) {
            return Ok(Some(ExitReason::StopLoss));
        }

        if position.bars_held >= self.params.stagnation_bars {
            return Ok(Some(ExitReason::Stagnation));
        }

        Ok(None)
    }

    fn get_stop_loss(&self, entry_price: f64) -> f64 {
        entry_price * (1.0 - self.params.sl_perc / 100.0)
    }

    fn get_take_profit(&self, entry_price: f64) -> f64 {
        entry_price * (1.0 + self.params.tp_perc / 100.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::testutil::candles_with_mids;
    use chrono::{TimeZone, Utc};

    fn strategy() -> RedCandlesSequenceStrategy {
        RedCandlesSequenceStrategy::new(RedCandlesParams {
            bars_count: 5,
            total_drop_perc: 5.0,
            tp_perc: 5.0,
            sl_perc: 50.0,
            stagnation_bars: 60,
        })
    }

    fn position(entry_price: f64) -> Position {
        Position::open(
            "bnbusdt".to_string(),
            "red_candles_sequence".to_string(),
            Utc.with_ymd_and_hms(2025, 10, 1, 0, 0, 0).unwrap(),
            entry_price,
            1.0,
            0,
        )
    }

    #[test]
    fn rising_candle_after_deep_sequence_buys() {
        let strategy = strategy();

        //five falling transitions dropping ~8%, then a rising candle
        let window = candles_with_mids(&[100.0, 98.0, 96.5, 95.0, 93.5, 92.0, 93.0]);
        assert!(strategy.check_buy_signal(&window).unwrap());
    }

    #[test]
    fn shallow_sequence_is_ignored() {
        let strategy = strategy();

        //falling but only ~2% total drop
        let window = candles_with_mids(&[100.0, 99.6, 99.2, 98.8, 98.4, 98.0, 98.5]);
        assert!(!strategy.check_buy_signal(&window).unwrap());
    }

    #[test]
    fn no_buy_without_the_upturn() {
        let strategy = strategy();
        let window = candles_with_mids(&[100.0, 98.0, 96.5, 95.0, 93.5, 92.0, 91.0]);
        assert!(!strategy.check_buy_signal(&window).unwrap());
    }

    #[test]
    fn take_profit_beats_stagnation() {
        let strategy = strategy();
        let mut pos = position(100.0);
        pos.bars_held = 59;

        let window = candles_with_mids(&[100.0, 106.0]);
        let reason = strategy.check_sell_signal(&window, &mut pos).unwrap();
        assert_eq!(reason, Some(ExitReason::TakeProfit));
    }

    #[test]
    fn stop_loss_fires_on_half_loss() {
        let strategy = strategy();
        let mut pos = position(100.0);

        let window = candles_with_mids(&[100.0, 49.0]);
        let reason = strategy.check_sell_signal(&window, &mut pos).unwrap();
        assert_eq!(reason, Some(ExitReason::StopLoss));
    }

    #[test]
    fn stagnation_exit_after_sixty_checks() {
        let strategy = strategy();
        let mut pos = position(100.0);
        let window = candles_with_mids(&[100.0, 101.0]);

        for _ in 0..59 {
            assert_eq!(strategy.check_sell_signal(&window, &mut pos).unwrap(), None);
        }
        let reason = strategy.check_sell_signal(&window, &mut pos).unwrap();
        assert_eq!(reason, Some(ExitReason::Stagnation));
        assert_eq!(pos.bars_held, 60);
    }
}
