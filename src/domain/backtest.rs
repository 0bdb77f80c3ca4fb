//! Backtest parameters shared by every trading book of a run.

use chrono::{NaiveDate, NaiveDateTime};

use super::capital_curve::DEFAULT_SMA_WINDOW;
use super::metrics::{ReturnPeriod, SharpeFrequency};

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub start_date: NaiveDate,
    pub initial_capital: f64,
    pub max_diversification: u32,
    pub reinvest_profits: bool,
    pub cost_rate: f64,
    pub filter_enabled: bool,
    pub sma_window: usize,
    pub risk_free_rate: f64,
    pub sharpe_frequency: SharpeFrequency,
    pub return_period: ReturnPeriod,
}

impl BacktestConfig {
    /// Timestamp of the opening deposit.
    pub fn start_timestamp(&self) -> NaiveDateTime {
        self.start_date.and_time(chrono::NaiveTime::MIN)
    }
}

impl Default for BacktestConfig {
    fn default() -> Self {
        BacktestConfig {
            start_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default(),
            initial_capital: 100_000.0,
            max_diversification: 10,
            reinvest_profits: true,
            cost_rate: 0.0005,
            filter_enabled: false,
            sma_window: DEFAULT_SMA_WINDOW,
            risk_free_rate: 0.10,
            sharpe_frequency: SharpeFrequency::Daily,
            return_period: ReturnPeriod::Annual,
        }
    }
}
