use crate::config::{BacktestConfig, ConfigError, ScanPolicy};
use crate::metrics::{BacktestReport, EquityPoint, TradeRecord};
use crate::portfolio::Position;
use crate::strategy::{body_mid_drop_perc, ExitReason, Strategy};
use crate::window::SlidingWindow;
use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use tracing::{info, warn};

//an instrument's window is not consulted during a scan below this many bars
const MIN_SIGNAL_BARS: usize = 10;

//main backtest engine
//walks time from start to end at a fixed interval, scanning the configured
//instruments for entries while flat and delegating exits to the owning
//strategy while in a position
//
//state machine: FLAT <-> IN_POSITION, at most one position, all-in sizing,
//capital is exactly zero while the position is open
pub struct BacktestEngine {
    config: BacktestConfig,
    windows: IndexMap<String, SlidingWindow>,
    strategy: Box<dyn Strategy>,

    capital: f64,
    position: Option<Position>,
    trades: Vec<TradeRecord>,
    equity_curve: Vec<EquityPoint>,

    //strategy evaluation errors absorbed as "no signal"
    skipped_evaluations: u64,
}

impl BacktestEngine {
    //creates a new backtest engine
    //configuration problems and a fully-empty window map are fatal here,
    //before the loop ever starts
    pub fn new(
        config: BacktestConfig,
        windows: IndexMap<String, SlidingWindow>,
        strategy: Box<dyn Strategy>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        if windows.is_empty() {
            return Err(ConfigError::NoMarketData);
        }

        let capital = config.initial_capital;

        Ok(BacktestEngine {
            config,
            windows,
            strategy,
            capital,
            position: None,
            trades: Vec::new(),
            equity_curve: Vec::new(),
            skipped_evaluations: 0,
        })
    }

    //runs the simulation loop and aggregates the report
    //per-step, per-instrument problems are absorbed, the loop always completes
    pub fn run(&mut self) -> BacktestReport {
        //reset state so repeated runs start identical
        self.capital = self.config.initial_capital;
        self.position = None;
        self.trades.clear();
        self.equity_curve.clear();
        self.skipped_evaluations = 0;

        let step = Duration::hours(self.config.interval_hours);
        let mut current = self.config.start;

        while current <= self.config.end {
            if self.position.is_some() {
                self.manage_position(current);
            } else {
                self.find_opportunity(current);
            }

            let position_value = self.position_value_at(current);
            self.equity_curve
                .push(EquityPoint::new(current, self.capital, position_value));

            current += step;
        }

        //force-close anything still open at the end of the period
        if self.position.is_some() {
            self.close_position(self.config.end, ExitReason::EndOfBacktest, None);
        }

        if self.skipped_evaluations > 0 {
            warn!(
                skipped = self.skipped_evaluations,
                "strategy evaluations were absorbed as no-signal"
            );
        }

        BacktestReport::from_run(
            self.config.initial_capital,
            self.capital,
            self.trades.clone(),
            self.equity_curve.clone(),
        )
    }

    //scans all instruments in configured order for a buy signal
    //instruments whose window is empty or too short at this step are skipped
    fn find_opportunity(&mut self, now: DateTime<Utc>) {
        let min_bars = MIN_SIGNAL_BARS.max(self.strategy.min_bars());
        let lookback = self.strategy.min_bars().saturating_sub(1);

        //(instrument, entry price, entry bar index, drop over lookback)
        let mut best: Option<(String, f64, usize, f64)> = None;

        for (instrument, window) in &self.windows {
            let bars = window.query_at(now);
            if bars.len() < min_bars {
                continue;
            }

            let signal = match self.strategy.check_buy_signal(bars) {
                Ok(signal) => signal,
                Err(err) => {
                    self.skipped_evaluations += 1;
                    warn!(instrument = %instrument, error = %err, "buy check failed, treating as no signal");
                    continue;
                }
            };

            if !signal {
                continue;
            }

            let entry_price = bars[bars.len() - 1].close;
            if entry_price <= 0.0 {
                continue;
            }

            let entry_bar_index = window.index_at(now).unwrap_or(0);

            match self.config.scan_policy {
                ScanPolicy::FirstMatch => {
                    best = Some((instrument.clone(), entry_price, entry_bar_index, 0.0));
                    break;
                }
                ScanPolicy::DeepestDrop => {
                    let drop = body_mid_drop_perc(bars, lookback).unwrap_or(0.0);
                    let deeper = best
                        .as_ref()
                        .map(|(_, _, _, best_drop)| drop > *best_drop)
                        .unwrap_or(true);
                    if deeper {
                        best = Some((instrument.clone(), entry_price, entry_bar_index, drop));
                    }
                }
            }
        }

        if let Some((instrument, entry_price, entry_bar_index, _)) = best {
            self.open_position(instrument, now, entry_price, entry_bar_index);
        }
    }

    //commits all capital into a new position
    fn open_position(
        &mut self,
        instrument: String,
        now: DateTime<Utc>,
        entry_price: f64,
        entry_bar_index: usize,
    ) {
        let quantity = self.capital / entry_price;

        info!(
            instrument = %instrument,
            price = entry_price,
            quantity,
            capital = self.capital,
            "BUY"
        );

        self.position = Some(Position::open(
            instrument,
            self.strategy.name().to_string(),
            now,
            entry_price,
            quantity,
            entry_bar_index,
        ));

        //all capital is deployed into the position
        self.capital = 0.0;
    }

    //evaluates the open position's exit conditions at this step
    //an empty window means no data at-or-before now, the step is skipped
    fn manage_position(&mut self, now: DateTime<Utc>) {
        let decision = {
            let position = match self.position.as_mut() {
                Some(position) => position,
                None => return,
            };

            let window = match self.windows.get(&position.instrument) {
                Some(window) => window,
                None => return,
            };

            let bars = window.query_at(now);
            if bars.is_empty() {
                return;
            }

            let current_price = bars[bars.len() - 1].close;

            match self.strategy.check_sell_signal(bars, position) {
                Ok(Some(reason)) => Some((reason, current_price)),
                Ok(None) => None,
                Err(err) => {
                    self.skipped_evaluations += 1;
                    warn!(
                        instrument = %position.instrument,
                        error = %err,
                        "sell check failed, holding position"
                    );
                    None
                }
            }
        };

        if let Some((reason, current_price)) = decision {
            self.close_position(now, reason, Some(current_price));
        }
    }

    //closes the open position, realizes the trade and restores capital
    //a stop-loss exit below the stop price is clamped to the stop price so a
    //price gap between steps cannot realize more than the configured loss
    fn close_position(
        &mut self,
        exit_time: DateTime<Utc>,
        reason: ExitReason,
        exit_price: Option<f64>,
    ) {
        let position = match self.position.take() {
            Some(position) => position,
            None => return,
        };

        let mut exit_price = exit_price
            .or_else(|| {
                self.windows
                    .get(&position.instrument)
                    .and_then(|window| window.close_at(exit_time))
            })
            .unwrap_or(position.entry_price);

        if reason == ExitReason::StopLoss {
            let sl_price = self.strategy.get_stop_loss(position.entry_price);
            if exit_price < sl_price {
                warn!(
                    instrument = %position.instrument,
                    realized = exit_price,
                    clamped = sl_price,
                    "stop-loss gap, exit clamped to the stop price"
                );
                exit_price = sl_price;
            }
        }

        let profit_perc = position.profit_perc(exit_price);
        let profit_abs = position.profit_abs(exit_price);

        //capital is replaced by the position's liquidation value
        self.capital = position.quantity * exit_price;

        info!(
            instrument = %position.instrument,
            price = exit_price,
            profit_perc,
            capital = self.capital,
            reason = %reason,
            "SELL"
        );

        self.trades.push(TradeRecord {
            instrument: position.instrument,
            entry_time: position.entry_time,
            entry_price: position.entry_price,
            exit_time,
            exit_price,
            quantity: position.quantity,
            profit_perc,
            profit_abs,
            capital_after: self.capital,
            exit_reason: reason,
        });
    }

    //mark-to-market of the open position at this step, zero while flat
    //falls back to the entry price when the window has no data yet
    fn position_value_at(&self, now: DateTime<Utc>) -> f64 {
        match &self.position {
            Some(position) => {
                let price = self
                    .windows
                    .get(&position.instrument)
                    .and_then(|window| window.close_at(now))
                    .unwrap_or(position.entry_price);
                position.value_at(price)
            }
            None => 0.0,
        }
    }

    //returns the current capital
    pub fn capital(&self) -> f64 {
        self.capital
    }

    //returns the trade ledger so far
    pub fn trades(&self) -> &[TradeRecord] {
        &self.trades
    }

    //returns how many strategy evaluations were absorbed as errors
    pub fn skipped_evaluations(&self) -> u64 {
        self.skipped_evaluations
    }
}
