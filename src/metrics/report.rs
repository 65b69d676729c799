use crate::metrics::equity::{max_drawdown, step_returns, EquityPoint};
use crate::strategy::ExitReason;
use chrono::{DateTime, Utc};
use prettytable::{Cell, Row, Table};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

//one closed round trip, appended to the ledger at position close
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    pub instrument: String,
    pub entry_time: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_time: DateTime<Utc>,
    pub exit_price: f64,
    pub quantity: f64,
    pub profit_perc: f64,
    pub profit_abs: f64,
    pub capital_after: f64,
    pub exit_reason: ExitReason,
}

//aggregate statistics plus the full ledger and equity curve
//all timestamps serialize to rfc3339 for the rendering collaborators
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestReport {
    pub initial_capital: f64,
    pub final_capital: f64,
    pub total_return_perc: f64,
    pub total_return_abs: f64,

    pub total_trades: usize,
    pub winning_trades: usize,
    pub losing_trades: usize,
    //percentage of trades with positive profit
    pub win_rate: f64,
    pub avg_profit_perc: f64,
    pub avg_loss_perc: f64,

    pub max_drawdown: f64,
    pub sharpe_ratio: f64,

    pub best_trade: Option<TradeRecord>,
    pub worst_trade: Option<TradeRecord>,

    pub trades: Vec<TradeRecord>,
    pub equity_curve: Vec<EquityPoint>,
}

impl BacktestReport {
    //aggregates the ledger and equity curve of a finished run
    //a zero-trade run yields zeroed statistics, never a division by zero
    pub fn from_run(
        initial_capital: f64,
        final_capital: f64,
        trades: Vec<TradeRecord>,
        equity_curve: Vec<EquityPoint>,
    ) -> Self {
        let total_trades = trades.len();
        let winners: Vec<&TradeRecord> =
            trades.iter().filter(|t| t.profit_perc > 0.0).collect();
        let losers: Vec<&TradeRecord> =
            trades.iter().filter(|t| t.profit_perc < 0.0).collect();

        let win_rate = if total_trades > 0 {
            winners.len() as f64 / total_trades as f64 * 100.0
        } else {
            0.0
        };

        let avg_profit_perc = if !winners.is_empty() {
            winners.iter().map(|t| t.profit_perc).sum::<f64>() / winners.len() as f64
        } else {
            0.0
        };

        let avg_loss_perc = if !losers.is_empty() {
            losers.iter().map(|t| t.profit_perc).sum::<f64>() / losers.len() as f64
        } else {
            0.0
        };

        let best_trade = trades
            .iter()
            .max_by(|a, b| a.profit_perc.total_cmp(&b.profit_perc))
            .cloned();
        let worst_trade = trades
            .iter()
            .min_by(|a, b| a.profit_perc.total_cmp(&b.profit_perc))
            .cloned();

        let (winning_trades, losing_trades) = (winners.len(), losers.len());

        let max_dd = max_drawdown(&equity_curve);
        let sharpe = sharpe_ratio(&step_returns(&equity_curve));

        BacktestReport {
            initial_capital,
            final_capital,
            total_return_perc: (final_capital - initial_capital) / initial_capital * 100.0,
            total_return_abs: final_capital - initial_capital,
            total_trades,
            winning_trades,
            losing_trades,
            win_rate,
            avg_profit_perc,
            avg_loss_perc,
            max_drawdown: max_dd,
            sharpe_ratio: sharpe,
            best_trade,
            worst_trade,
            trades,
            equity_curve,
        }
    }

    //prints the summary in a formatted table
    pub fn pretty_print_table(&self) {
        let mut table = Table::new();

        table.add_row(Row::new(vec![Cell::new("Metric"), Cell::new("Value")]));

        table.add_row(Row::new(vec![
            Cell::new("Initial Capital"),
            Cell::new(&format!("{:.2}", self.initial_capital)),
        ]));

        table.add_row(Row::new(vec![
            Cell::new("Final Capital"),
            Cell::new(&format!("{:.2}", self.final_capital)),
        ]));

        table.add_row(Row::new(vec![
            Cell::new("Total Return"),
            Cell::new(&format!(
                "{:.2} ({:+.2}%)",
                self.total_return_abs, self.total_return_perc
            )),
        ]));

        table.add_row(Row::new(vec![
            Cell::new("Max Drawdown"),
            Cell::new(&format!("{:.2}%", self.max_drawdown * 100.0)),
        ]));

        table.add_row(Row::new(vec![
            Cell::new("Sharpe Ratio"),
            Cell::new(&format!("{:.3}", self.sharpe_ratio)),
        ]));

        table.add_row(Row::new(vec![
            Cell::new("Total Trades"),
            Cell::new(&format!("{}", self.total_trades)),
        ]));

        table.add_row(Row::new(vec![
            Cell::new("Winning / Losing"),
            Cell::new(&format!("{} / {}", self.winning_trades, self.losing_trades)),
        ]));

        table.add_row(Row::new(vec![
            Cell::new("Win Rate"),
            Cell::new(&format!("{:.1}%", self.win_rate)),
        ]));

        table.add_row(Row::new(vec![
            Cell::new("Avg Win"),
            Cell::new(&format!("{:+.2}%", self.avg_profit_perc)),
        ]));

        table.add_row(Row::new(vec![
            Cell::new("Avg Loss"),
            Cell::new(&format!("{:+.2}%", self.avg_loss_perc)),
        ]));

        if let Some(best) = &self.best_trade {
            table.add_row(Row::new(vec![
                Cell::new("Best Trade"),
                Cell::new(&format!("{} {:+.2}%", best.instrument, best.profit_perc)),
            ]));
        }

        if let Some(worst) = &self.worst_trade {
            table.add_row(Row::new(vec![
                Cell::new("Worst Trade"),
                Cell::new(&format!("{} {:+.2}%", worst.instrument, worst.profit_perc)),
            ]));
        }

        table.printstd();
    }

    //prints the full trade ledger
    pub fn pretty_print_trades(&self) {
        if self.trades.is_empty() {
            return;
        }

        let mut table = Table::new();
        table.add_row(Row::new(vec![
            Cell::new("Instrument"),
            Cell::new("Entry"),
            Cell::new("Exit"),
            Cell::new("Entry Px"),
            Cell::new("Exit Px"),
            Cell::new("Profit %"),
            Cell::new("Reason"),
        ]));

        for trade in &self.trades {
            table.add_row(Row::new(vec![
                Cell::new(&trade.instrument),
                Cell::new(&trade.entry_time.to_rfc3339()),
                Cell::new(&trade.exit_time.to_rfc3339()),
                Cell::new(&format!("{:.4}", trade.entry_price)),
                Cell::new(&format!("{:.4}", trade.exit_price)),
                Cell::new(&format!("{:+.2}", trade.profit_perc)),
                Cell::new(&trade.exit_reason.to_string()),
            ]));
        }

        table.printstd();
    }
}

//annualized sharpe over per-step returns, assuming hourly steps
fn sharpe_ratio(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }

    let mean = returns.mean();
    let std_dev = returns.std_dev();

    if std_dev == 0.0 {
        return 0.0;
    }

    //24 * 365 hourly steps per year
    (mean / std_dev) * (24.0 * 365.0_f64).sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn trade(instrument: &str, profit_perc: f64) -> TradeRecord {
        let time = Utc.with_ymd_and_hms(2025, 10, 1, 0, 0, 0).unwrap();
        TradeRecord {
            instrument: instrument.to_string(),
            entry_time: time,
            entry_price: 100.0,
            exit_time: time,
            exit_price: 100.0 * (1.0 + profit_perc / 100.0),
            quantity: 1.0,
            profit_perc,
            profit_abs: profit_perc,
            capital_after: 100.0 + profit_perc,
            exit_reason: ExitReason::TakeProfit,
        }
    }

    #[test]
    fn zero_trades_yield_zeroed_statistics() {
        let report = BacktestReport::from_run(100.0, 100.0, vec![], vec![]);
        assert_eq!(report.total_trades, 0);
        assert_eq!(report.win_rate, 0.0);
        assert_eq!(report.avg_profit_perc, 0.0);
        assert_eq!(report.avg_loss_perc, 0.0);
        assert_eq!(report.total_return_perc, 0.0);
        assert!(report.best_trade.is_none());
        assert!(report.worst_trade.is_none());
    }

    #[test]
    fn aggregates_winners_and_losers() {
        let trades = vec![
            trade("btcusdt", 10.0),
            trade("ethusdt", -4.0),
            trade("xrpusdt", 6.0),
        ];
        let report = BacktestReport::from_run(100.0, 112.0, trades, vec![]);

        assert_eq!(report.total_trades, 3);
        assert_eq!(report.winning_trades, 2);
        assert_eq!(report.losing_trades, 1);
        assert!((report.win_rate - 200.0 / 3.0).abs() < 1e-9);
        assert!((report.avg_profit_perc - 8.0).abs() < 1e-9);
        assert!((report.avg_loss_perc + 4.0).abs() < 1e-9);
        assert!((report.total_return_perc - 12.0).abs() < 1e-9);
        assert_eq!(report.best_trade.as_ref().unwrap().instrument, "btcusdt");
        assert_eq!(report.worst_trade.as_ref().unwrap().instrument, "ethusdt");
    }

    #[test]
    fn breakeven_trade_counts_as_neither_win_nor_loss() {
        let report = BacktestReport::from_run(100.0, 100.0, vec![trade("btcusdt", 0.0)], vec![]);
        assert_eq!(report.total_trades, 1);
        assert_eq!(report.winning_trades, 0);
        assert_eq!(report.losing_trades, 0);
        assert_eq!(report.win_rate, 0.0);
    }

    #[test]
    fn report_serializes_timestamps_as_rfc3339() {
        let report = BacktestReport::from_run(100.0, 110.0, vec![trade("btcusdt", 10.0)], vec![]);
        let json = serde_json::to_string(&report).unwrap();
        assert!(json.contains("2025-10-01T00:00:00Z"));
        assert!(json.contains("TAKE_PROFIT"));
    }
}
