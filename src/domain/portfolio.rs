//! Portfolio orchestrator over an execution book and an optional reference
//! book.
//!
//! With the capital-curve filter enabled, the reference book takes every
//! entry and its daily curve decides whether the execution book follows.
//! Deposits, marks and closes reach both books.

use chrono::NaiveDateTime;
use tracing::{debug, warn};

use super::backtest::BacktestConfig;
use super::error::TradebookError;
use super::patrimony::{Adjustment, PatrimonySnapshot};
use super::price_panel::PricePanel;
use super::trading_book::{OpenOrder, TradingBook};

/// Which books took an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpenOutcome {
    pub reference: bool,
    pub execution: bool,
}

impl OpenOutcome {
    /// The reference book opened but the gate kept the execution book out.
    pub fn gated(&self) -> bool {
        self.reference && !self.execution
    }
}

/// Realized results of a mirrored close, per book that held the asset.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CloseOutcome {
    pub reference: Option<f64>,
    pub execution: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Portfolio {
    execution: TradingBook,
    reference: Option<TradingBook>,
}

impl Portfolio {
    pub fn new(config: &BacktestConfig) -> Self {
        Portfolio {
            execution: TradingBook::new(config),
            reference: config.filter_enabled.then(|| TradingBook::new(config)),
        }
    }

    pub fn filter_enabled(&self) -> bool {
        self.reference.is_some()
    }

    pub fn execution(&self) -> &TradingBook {
        &self.execution
    }

    pub fn reference(&self) -> Option<&TradingBook> {
        self.reference.as_ref()
    }

    fn books_mut(&mut self) -> impl Iterator<Item = &mut TradingBook> {
        self.reference.iter_mut().chain(std::iter::once(&mut self.execution))
    }

    /// Applies the adjustment to every book and returns the execution
    /// book's new snapshot.
    pub fn adjust_patrimony(
        &mut self,
        timestamp: NaiveDateTime,
        adjustment: Adjustment,
        amount: f64,
    ) -> PatrimonySnapshot {
        if let Some(reference) = self.reference.as_mut() {
            reference.adjust_patrimony(timestamp, adjustment, amount);
        }
        self.execution.adjust_patrimony(timestamp, adjustment, amount)
    }

    /// True when new entries would reach the execution book.
    pub fn passes_gate(&self) -> bool {
        self.reference
            .as_ref()
            .is_none_or(TradingBook::passes_gate)
    }

    pub fn open_position(&mut self, order: OpenOrder) -> Result<OpenOutcome, TradebookError> {
        let mut outcome = OpenOutcome::default();

        if let Some(reference) = self.reference.as_mut() {
            reference.open_position(order.clone())?;
            outcome.reference = true;
            if !reference.passes_gate() {
                warn!(
                    asset = %order.asset,
                    timestamp = %order.entry_date,
                    "entry gated out: reference capital below its moving average"
                );
                return Ok(outcome);
            }
        }

        self.execution.open_position(order)?;
        outcome.execution = true;
        Ok(outcome)
    }

    /// Closes `asset` in every book that holds it open. Fails only when no
    /// book does.
    pub fn close_position(
        &mut self,
        exit_date: NaiveDateTime,
        asset: &str,
        exit_price: f64,
    ) -> Result<CloseOutcome, TradebookError> {
        let mut outcome = CloseOutcome::default();

        if let Some(reference) = self.reference.as_mut() {
            if reference.has_open_position(asset) {
                outcome.reference = Some(reference.close_position(exit_date, asset, exit_price)?);
            }
        }
        if self.execution.has_open_position(asset) {
            outcome.execution = Some(self.execution.close_position(exit_date, asset, exit_price)?);
        }

        if outcome.reference.is_none() && outcome.execution.is_none() {
            return Err(TradebookError::PositionNotFound {
                asset: asset.to_string(),
            });
        }
        Ok(outcome)
    }

    /// Marks every book's open positions to the panel close of the
    /// timestamp's day.
    pub fn mark_to_market(
        &mut self,
        timestamp: NaiveDateTime,
        panel: &PricePanel,
    ) -> Result<PatrimonySnapshot, TradebookError> {
        if let Some(reference) = self.reference.as_mut() {
            reference.mark_to_market(timestamp, panel)?;
        }
        let snapshot = self.execution.mark_to_market(timestamp, panel)?;
        debug!(%timestamp, capital = snapshot.capital, "marked to market");
        Ok(snapshot)
    }

    /// Raises the stop in every book that holds `asset` open.
    pub fn raise_stop_loss(&mut self, asset: &str, stop_loss: f64) -> Result<(), TradebookError> {
        let mut found = false;
        for book in self.books_mut() {
            if book.has_open_position(asset) {
                book.raise_stop_loss(asset, stop_loss)?;
                found = true;
            }
        }
        if found {
            Ok(())
        } else {
            Err(TradebookError::PositionNotFound {
                asset: asset.to_string(),
            })
        }
    }

    pub fn size_order(&self, price: f64) -> u64 {
        self.execution.size_order(price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::capital_curve::DEFAULT_SMA_WINDOW;
    use crate::domain::position::Side;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn at(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, d)
            .unwrap()
            .and_hms_opt(17, 0, 0)
            .unwrap()
    }

    fn config(filter_enabled: bool) -> BacktestConfig {
        BacktestConfig {
            start_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            initial_capital: 10_000.0,
            max_diversification: 2,
            reinvest_profits: true,
            cost_rate: 0.0,
            filter_enabled,
            sma_window: 2,
            ..BacktestConfig::default()
        }
    }

    fn order(asset: &str, d: u32, price: f64) -> OpenOrder {
        OpenOrder {
            entry_date: at(d),
            asset: asset.into(),
            side: Side::Buy,
            volume: 100,
            entry_price: price,
            relative_strength: 1.0,
            stop_loss: None,
            stop_gain: None,
        }
    }

    /// Pushes both curves under their moving average on day `d`.
    fn depress_curve(portfolio: &mut Portfolio, d: u32) {
        portfolio.adjust_patrimony(at(d), Adjustment::DecBalance, 1_000.0);
        portfolio.adjust_patrimony(at(d), Adjustment::MarkToMarket, 0.0);
    }

    #[test]
    fn without_filter_only_execution_exists() {
        let mut portfolio = Portfolio::new(&config(false));
        assert!(!portfolio.filter_enabled());
        assert!(portfolio.reference().is_none());

        depress_curve(&mut portfolio, 2);
        assert!(!portfolio.execution().passes_gate());
        assert!(portfolio.passes_gate());

        let outcome = portfolio.open_position(order("ITUB4", 2, 30.0)).unwrap();
        assert_eq!(
            outcome,
            OpenOutcome {
                reference: false,
                execution: true
            }
        );
        assert!(portfolio.execution().has_open_position("ITUB4"));
    }

    #[test]
    fn deposits_are_mirrored() {
        let mut portfolio = Portfolio::new(&config(true));
        let snapshot = portfolio.adjust_patrimony(at(2), Adjustment::Deposit, 500.0);
        assert_relative_eq!(snapshot.balance, 10_500.0);
        assert_relative_eq!(portfolio.reference().unwrap().ledger().balance(), 10_500.0);
    }

    #[test]
    fn open_reaches_both_books_while_gate_passes() {
        let mut portfolio = Portfolio::new(&config(true));
        let outcome = portfolio.open_position(order("ITUB4", 2, 30.0)).unwrap();
        assert!(outcome.reference && outcome.execution);
        assert!(!outcome.gated());
    }

    #[test]
    fn reference_below_average_gates_execution() {
        let mut portfolio = Portfolio::new(&config(true));
        depress_curve(&mut portfolio, 2);
        assert!(!portfolio.passes_gate());

        let outcome = portfolio.open_position(order("ITUB4", 2, 30.0)).unwrap();
        assert!(outcome.gated());
        assert!(portfolio.reference().unwrap().has_open_position("ITUB4"));
        assert!(!portfolio.execution().has_open_position("ITUB4"));
        assert_eq!(portfolio.execution().operations().len(), 0);
    }

    #[test]
    fn default_window_gates_once_five_days_are_recorded() {
        let config = BacktestConfig {
            sma_window: DEFAULT_SMA_WINDOW,
            ..config(true)
        };
        let mut portfolio = Portfolio::new(&config);
        for d in 2..=4 {
            portfolio.adjust_patrimony(at(d), Adjustment::MarkToMarket, 0.0);
            assert!(portfolio.passes_gate());
        }
        let curve = portfolio.reference().unwrap().curve();
        assert_eq!(curve.len(), 4);
        assert_eq!(curve.latest().unwrap().moving_average, None);

        depress_curve(&mut portfolio, 5);
        let latest = portfolio.reference().unwrap().curve().latest().unwrap();
        assert_relative_eq!(latest.moving_average.unwrap(), 9_800.0);
        assert_relative_eq!(latest.capital, 9_000.0);
        assert!(!portfolio.passes_gate());

        let outcome = portfolio.open_position(order("ITUB4", 5, 30.0)).unwrap();
        assert!(outcome.gated());
        assert!(!portfolio.execution().has_open_position("ITUB4"));

        // Recovery above the five-day mean reopens the gate.
        portfolio.adjust_patrimony(at(6), Adjustment::IncBalance, 2_000.0);
        portfolio.adjust_patrimony(at(6), Adjustment::MarkToMarket, 0.0);
        assert!(portfolio.passes_gate());
    }

    #[test]
    fn close_mirrors_to_books_holding_the_asset() {
        let mut portfolio = Portfolio::new(&config(true));
        depress_curve(&mut portfolio, 2);
        portfolio.open_position(order("ITUB4", 2, 30.0)).unwrap();

        let outcome = portfolio.close_position(at(4), "ITUB4", 31.0).unwrap();
        assert_relative_eq!(outcome.reference.unwrap(), 100.0);
        assert_eq!(outcome.execution, None);

        let err = portfolio.close_position(at(5), "ITUB4", 31.0).unwrap_err();
        assert!(matches!(err, TradebookError::PositionNotFound { .. }));
    }

    #[test]
    fn close_reports_execution_result() {
        let mut portfolio = Portfolio::new(&config(true));
        portfolio.open_position(order("ITUB4", 2, 30.0)).unwrap();
        let outcome = portfolio.close_position(at(3), "ITUB4", 29.0).unwrap();
        assert_relative_eq!(outcome.execution.unwrap(), -100.0);
        assert_relative_eq!(outcome.reference.unwrap(), -100.0);
    }

    #[test]
    fn duplicate_open_propagates() {
        let mut portfolio = Portfolio::new(&config(false));
        portfolio.open_position(order("ITUB4", 2, 30.0)).unwrap();
        let err = portfolio.open_position(order("ITUB4", 3, 31.0)).unwrap_err();
        assert!(matches!(err, TradebookError::DuplicatePosition { .. }));
    }

    #[test]
    fn mark_and_raise_stop_reach_both_books() {
        let mut portfolio = Portfolio::new(&config(true));
        portfolio.open_position(order("ITUB4", 2, 30.0)).unwrap();

        let mut panel = PricePanel::new();
        panel.insert(at(3).date(), "ITUB4", 32.0);
        let snapshot = portfolio.mark_to_market(at(3), &panel).unwrap();
        assert_relative_eq!(snapshot.capital, 10_200.0);
        assert_relative_eq!(portfolio.reference().unwrap().ledger().capital(), 10_200.0);

        portfolio.raise_stop_loss("ITUB4", 29.0).unwrap();
        assert_eq!(portfolio.execution().stop_loss("ITUB4"), Some(29.0));
        assert_eq!(portfolio.reference().unwrap().stop_loss("ITUB4"), Some(29.0));
        assert!(portfolio.raise_stop_loss("PETR4", 1.0).is_err());
    }

    #[test]
    fn size_order_uses_execution_book() {
        let portfolio = Portfolio::new(&config(true));
        assert_eq!(portfolio.size_order(33.0), 100);
    }
}
