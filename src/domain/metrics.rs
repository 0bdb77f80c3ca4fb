//! Performance metrics and statistics.
//!
//! Everything here is a pure read of a [`TradingBook`] and the price panel.
//! Ratios whose denominator is zero come back as `None` so one undefined
//! figure never takes the rest of the report down with it. The recovery
//! factor is the exception and falls back to zero.

use chrono::{Datelike, Duration, NaiveDate};
use std::collections::BTreeMap;
use std::str::FromStr;

use super::backtest::BacktestConfig;
use super::error::TradebookError;
use super::patrimony::PatrimonySnapshot;
use super::position::Position;
use super::price_panel::PricePanel;
use super::trading_book::TradingBook;
use tracing::warn;

/// Sampling frequency of the returns fed to the Sharpe ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SharpeFrequency {
    Daily,
    Weekly,
    Monthly,
}

impl SharpeFrequency {
    pub fn periods_per_year(self) -> f64 {
        match self {
            SharpeFrequency::Daily => 252.0,
            SharpeFrequency::Weekly => 52.0,
            SharpeFrequency::Monthly => 12.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SharpeFrequency::Daily => "daily",
            SharpeFrequency::Weekly => "weekly",
            SharpeFrequency::Monthly => "monthly",
        }
    }
}

impl FromStr for SharpeFrequency {
    type Err = TradebookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily" | "diária" | "diaria" => Ok(SharpeFrequency::Daily),
            "weekly" | "semanal" => Ok(SharpeFrequency::Weekly),
            "monthly" | "mensal" => Ok(SharpeFrequency::Monthly),
            _ => Err(TradebookError::InvalidFrequency {
                value: s.to_string(),
            }),
        }
    }
}

/// Resampling period for the average periodic return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnPeriod {
    Daily,
    /// Weeks end on Sunday.
    Weekly,
    Monthly,
    Quarterly,
    Annual,
}

impl ReturnPeriod {
    pub fn code(self) -> &'static str {
        match self {
            ReturnPeriod::Daily => "D",
            ReturnPeriod::Weekly => "W",
            ReturnPeriod::Monthly => "M",
            ReturnPeriod::Quarterly => "Q",
            ReturnPeriod::Annual => "A",
        }
    }

    /// Last calendar day of the period containing `date`.
    pub fn period_end(self, date: NaiveDate) -> NaiveDate {
        match self {
            ReturnPeriod::Daily => date,
            ReturnPeriod::Weekly => {
                let days_to_sunday = 6 - date.weekday().num_days_from_monday() as i64;
                date + Duration::days(days_to_sunday)
            }
            ReturnPeriod::Monthly => month_end(date.year(), date.month()).unwrap_or(date),
            ReturnPeriod::Quarterly => {
                let last_month = ((date.month() - 1) / 3 + 1) * 3;
                month_end(date.year(), last_month).unwrap_or(date)
            }
            ReturnPeriod::Annual => NaiveDate::from_ymd_opt(date.year(), 12, 31).unwrap_or(date),
        }
    }
}

fn month_end(year: i32, month: u32) -> Option<NaiveDate> {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1).and_then(|d| d.pred_opt())
}

impl FromStr for ReturnPeriod {
    type Err = TradebookError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "D" | "DAILY" => Ok(ReturnPeriod::Daily),
            "W" | "WEEKLY" => Ok(ReturnPeriod::Weekly),
            "M" | "ME" | "MONTHLY" => Ok(ReturnPeriod::Monthly),
            "Q" | "QE" | "QUARTERLY" => Ok(ReturnPeriod::Quarterly),
            "A" | "Y" | "YE" | "ANNUAL" | "YEARLY" => Ok(ReturnPeriod::Annual),
            _ => Err(TradebookError::InvalidFrequency {
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Drawdown {
    pub max_abs: Option<f64>,
    /// Positive percentage, e.g. 12.5 for a 12.5% drop from the peak.
    pub max_pct: Option<f64>,
}

/// Drawdown of the balance series against its running peak.
pub fn drawdown(snapshots: &[PatrimonySnapshot]) -> Drawdown {
    let Some(first) = snapshots.first() else {
        return Drawdown {
            max_abs: None,
            max_pct: None,
        };
    };

    let mut peak = first.balance;
    let mut min_dd = 0.0_f64;
    let mut min_dd_pct: Option<f64> = Some(0.0);

    for snapshot in snapshots {
        peak = peak.max(snapshot.balance);
        let dd = snapshot.balance - peak;
        min_dd = min_dd.min(dd);
        min_dd_pct = match min_dd_pct {
            Some(current) if peak != 0.0 => Some(current.min(dd / peak)),
            _ => None,
        };
    }

    Drawdown {
        max_abs: Some(0.0 - min_dd),
        max_pct: min_dd_pct.map(|pct| 0.0 - pct * 100.0),
    }
}

/// Closed-position realized returns summed by entry day.
pub fn daily_returns<'a>(positions: impl Iterator<Item = &'a Position>) -> BTreeMap<NaiveDate, f64> {
    let mut by_day: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for position in positions {
        if let Some(ret) = position.realized_return() {
            *by_day.entry(position.entry_date.date()).or_insert(0.0) += ret;
        }
    }
    by_day
}

/// `(mean - rf / periods) / sample_std`. Undefined with fewer than two
/// returns or zero dispersion.
pub fn sharpe_ratio(returns: &[f64], annual_risk_free: f64, frequency: SharpeFrequency) -> Option<f64> {
    if returns.len() < 2 {
        return None;
    }
    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let stddev = variance.sqrt();
    if stddev == 0.0 || !stddev.is_finite() {
        return None;
    }
    let rf = annual_risk_free / frequency.periods_per_year();
    Some((mean - rf) / stddev)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeriodicReturn {
    pub period_end: NaiveDate,
    pub capital: f64,
    pub change: Option<f64>,
}

/// Capital resampled to period ends (last value per period) with the
/// opening capital prepended as period zero, and the change between rows.
pub fn periodic_returns(snapshots: &[PatrimonySnapshot], period: ReturnPeriod) -> Vec<PeriodicReturn> {
    let Some(first) = snapshots.first() else {
        return Vec::new();
    };

    let mut resampled: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for snapshot in snapshots {
        resampled.insert(period.period_end(snapshot.timestamp.date()), snapshot.capital);
    }

    let mut rows = Vec::with_capacity(resampled.len());
    let mut previous = first.capital;
    for (period_end, capital) in resampled {
        let change = if previous != 0.0 {
            Some((capital - previous) / previous)
        } else {
            None
        };
        rows.push(PeriodicReturn {
            period_end,
            capital,
            change,
        });
        previous = capital;
    }
    rows
}

pub fn mean_periodic_return(rows: &[PeriodicReturn]) -> Option<f64> {
    mean(rows.iter().filter_map(|r| r.change))
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, count) = values.fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if count == 0 {
        None
    } else {
        Some(sum / count as f64)
    }
}

fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        None
    } else {
        Some(numerator / denominator)
    }
}

/// Unrealized result and market value of the open positions at the panel's
/// last date. Undefined when the panel cannot price every open asset.
fn open_book_values(book: &TradingBook, panel: &PricePanel) -> (Option<f64>, Option<f64>) {
    if book.open_position_count() == 0 {
        return (Some(0.0), Some(0.0));
    }
    let Some(last) = panel.last_date() else {
        warn!(open = book.open_position_count(), "price panel is empty, open positions not valued");
        return (None, None);
    };
    match (
        book.unrealized_result_all(last, panel),
        book.open_capital(last, panel),
    ) {
        (Ok(result), Ok(capital)) => (Some(result), Some(capital)),
        (Err(e), _) | (_, Err(e)) => {
            warn!(date = %last, error = %e, "open positions not valued");
            (None, None)
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    pub initial_capital: f64,
    pub net_profit: f64,
    pub net_return_pct: f64,
    pub final_balance: f64,
    pub max_drawdown_abs: Option<f64>,
    pub max_drawdown_pct: Option<f64>,
    pub recovery_factor: f64,
    pub total_positions: usize,
    pub closed_positions: usize,
    pub total_operations: usize,
    pub hit_rate: Option<f64>,
    pub profit_factor: Option<f64>,
    pub payoff: Option<f64>,
    pub sharpe_ratio: Option<f64>,
    pub mean_win: Option<f64>,
    pub mean_loss: Option<f64>,
    pub mean_win_return: Option<f64>,
    pub mean_loss_return: Option<f64>,
    pub profit_per_position: Option<f64>,
    pub return_per_position: Option<f64>,
    pub expectancy: Option<f64>,
    pub normalized_expectancy: Option<f64>,
    /// `None` when an open asset has no close on the panel's last date.
    pub open_result: Option<f64>,
    pub open_capital: Option<f64>,
    pub current_capital: f64,
    pub current_liquidity: f64,
    pub return_period: ReturnPeriod,
    pub mean_periodic_return: Option<f64>,
    pub periodic_returns: Vec<PeriodicReturn>,
}

impl Metrics {
    pub fn compute(
        book: &TradingBook,
        panel: &PricePanel,
        config: &BacktestConfig,
    ) -> Result<Self, TradebookError> {
        let ledger = book.ledger();
        let snapshots = ledger.snapshots();
        let initial_capital = ledger.initial_capital();
        let closed: Vec<&Position> = book.positions().closed_positions().collect();

        let results: Vec<f64> = closed.iter().filter_map(|p| p.realized_result()).collect();
        let returns: Vec<f64> = closed.iter().filter_map(|p| p.realized_return()).collect();

        let net_profit: f64 = results.iter().sum();
        let net_return_pct = ratio(net_profit, initial_capital).unwrap_or(0.0) * 100.0;

        let dd = drawdown(snapshots);
        let recovery_factor = if book.reinvest_profits() {
            dd.max_pct.and_then(|pct| ratio(net_return_pct, pct))
        } else {
            dd.max_abs.and_then(|abs| ratio(net_profit, abs))
        }
        .unwrap_or(0.0);

        let closed_count = closed.len() as f64;
        let winners = results.iter().filter(|&&r| r > 0.0).count() as f64;
        let hit_rate = ratio(winners, closed_count);

        let mean_win = mean(results.iter().copied().filter(|&r| r > 0.0));
        let mean_loss = mean(results.iter().copied().filter(|&r| r <= 0.0)).map(f64::abs);
        let mean_win_return = mean(returns.iter().copied().filter(|&r| r > 0.0));
        let mean_loss_return = mean(returns.iter().copied().filter(|&r| r <= 0.0)).map(f64::abs);

        let payoff = match (mean_win_return, mean_loss_return) {
            (Some(win), Some(loss)) => ratio(win, loss),
            _ => None,
        };
        let win_return_sum: f64 = returns.iter().filter(|&&r| r > 0.0).sum();
        let loss_return_sum: f64 = returns.iter().filter(|&&r| r <= 0.0).sum::<f64>().abs();
        let profit_factor = if closed.is_empty() {
            None
        } else {
            ratio(win_return_sum, loss_return_sum)
        };

        // A side with no trades carries zero weight in the expectancy.
        let expectancy = hit_rate.map(|hit| {
            hit * mean_win.unwrap_or(0.0) - (1.0 - hit) * mean_loss.unwrap_or(0.0)
        });
        let normalized_expectancy = match (payoff, hit_rate) {
            (Some(payoff), Some(hit)) => Some(payoff * hit - (1.0 - hit)),
            _ => None,
        };

        let by_day: Vec<f64> = daily_returns(closed.iter().copied()).into_values().collect();
        let sharpe_ratio = sharpe_ratio(&by_day, config.risk_free_rate, config.sharpe_frequency);

        let (open_result, open_capital) = open_book_values(book, panel);

        let periodic = periodic_returns(snapshots, config.return_period);

        Ok(Metrics {
            initial_capital,
            net_profit,
            net_return_pct,
            final_balance: initial_capital + net_profit,
            max_drawdown_abs: dd.max_abs,
            max_drawdown_pct: dd.max_pct,
            recovery_factor,
            total_positions: book.positions().len(),
            closed_positions: closed.len(),
            total_operations: book.operations().len(),
            hit_rate,
            profit_factor,
            payoff,
            sharpe_ratio,
            mean_win,
            mean_loss,
            mean_win_return,
            mean_loss_return,
            profit_per_position: ratio(net_profit, closed_count),
            return_per_position: ratio(returns.iter().sum(), closed_count),
            expectancy,
            normalized_expectancy,
            open_result,
            open_capital,
            current_capital: ledger.capital(),
            current_liquidity: ledger.liquidity(),
            return_period: config.return_period,
            mean_periodic_return: mean_periodic_return(&periodic),
            periodic_returns: periodic,
        })
    }
}
