use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

//one per-step snapshot of the run's economics
//capital is the idle cash (zero while a position is open),
//position_value is the mark-to-market of the open position (zero while flat)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquityPoint {
    pub time: DateTime<Utc>,
    pub capital: f64,
    pub position_value: f64,
}

impl EquityPoint {
    pub fn new(time: DateTime<Utc>, capital: f64, position_value: f64) -> Self {
        EquityPoint {
            time,
            capital,
            position_value,
        }
    }

    //total equity at this step
    pub fn equity(&self) -> f64 {
        self.capital + self.position_value
    }
}

//peak-to-trough maximum drawdown over the equity series, as a fraction
pub fn max_drawdown(curve: &[EquityPoint]) -> f64 {
    let mut peak = f64::MIN;
    let mut max_dd = 0.0;

    for point in curve {
        let equity = point.equity();
        if equity > peak {
            peak = equity;
        }
        if peak > 0.0 {
            let drawdown = (peak - equity) / peak;
            if drawdown > max_dd {
                max_dd = drawdown;
            }
        }
    }

    max_dd
}

//per-step fractional equity returns
pub fn step_returns(curve: &[EquityPoint]) -> Vec<f64> {
    if curve.len() < 2 {
        return vec![];
    }

    let mut returns = Vec::with_capacity(curve.len() - 1);
    for pair in curve.windows(2) {
        let prev = pair[0].equity();
        if prev != 0.0 {
            returns.push((pair[1].equity() - prev) / prev);
        } else {
            returns.push(0.0);
        }
    }
    returns
}
