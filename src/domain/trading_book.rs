//! Trading book: one self-contained set of patrimony ledger, position book,
//! operation log and daily capital curve.
//!
//! Every open and close is written to all three ledgers:
//!
//! | event | operation | patrimony |
//! |---|---|---|
//! | open BUY | IN BUY | DEC_LIQUIDO notional + cost, DEC_SALDO cost |
//! | open SELL | IN SELL | DEC_SALDO cost |
//! | close BUY | OUT SELL | INC_LIQUIDO notional - cost, INC_SALDO result, DEC_SALDO cost |
//! | close SELL | OUT BUY | INC_SALDO result, DEC_SALDO cost |
//!
//! Short entries are charged only the operational cost, never the notional.

use chrono::{NaiveDate, NaiveDateTime};
use tracing::debug;

use super::backtest::BacktestConfig;
use super::capital_curve::DailyCapitalCurve;
use super::error::TradebookError;
use super::operation::{Direction, OperationLog, OperationRecord};
use super::patrimony::{Adjustment, PatrimonyLedger, PatrimonySnapshot};
use super::position::{Position, Side};
use super::position_book::PositionBook;
use super::price_panel::PricePanel;

/// Minimum tradable increment used by [`TradingBook::size_order`].
pub const LOT_SIZE: u64 = 100;

/// Arguments of a position entry.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenOrder {
    pub entry_date: NaiveDateTime,
    pub asset: String,
    pub side: Side,
    pub volume: u64,
    pub entry_price: f64,
    pub relative_strength: f64,
    pub stop_loss: Option<f64>,
    pub stop_gain: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradingBook {
    initial_capital: f64,
    max_diversification: u32,
    reinvest_profits: bool,
    cost_rate: f64,
    ledger: PatrimonyLedger,
    positions: PositionBook,
    operations: OperationLog,
    curve: DailyCapitalCurve,
}

impl TradingBook {
    /// Creates the book and deposits the initial capital at the start date.
    pub fn new(config: &BacktestConfig) -> Self {
        let mut book = TradingBook {
            initial_capital: config.initial_capital,
            max_diversification: config.max_diversification.max(1),
            reinvest_profits: config.reinvest_profits,
            cost_rate: config.cost_rate,
            ledger: PatrimonyLedger::new(),
            positions: PositionBook::new(),
            operations: OperationLog::new(),
            curve: DailyCapitalCurve::new(config.sma_window),
        };
        book.adjust_patrimony(
            config.start_timestamp(),
            Adjustment::Deposit,
            config.initial_capital,
        );
        book
    }

    pub fn adjust_patrimony(
        &mut self,
        timestamp: NaiveDateTime,
        adjustment: Adjustment,
        amount: f64,
    ) -> PatrimonySnapshot {
        self.ledger
            .apply(timestamp, adjustment, amount, &mut self.curve)
    }

    pub fn open_position(&mut self, order: OpenOrder) -> Result<&Position, TradebookError> {
        let OpenOrder {
            entry_date,
            asset,
            side,
            volume,
            entry_price,
            relative_strength,
            stop_loss,
            stop_gain,
        } = order;
        let cost = volume as f64 * entry_price * self.cost_rate;
        let notional = volume as f64 * entry_price;

        // Rejects duplicates before anything is written.
        self.positions.open(Position {
            asset: asset.clone(),
            side,
            volume,
            entry_date,
            entry_price,
            relative_strength,
            stop_loss,
            stop_gain,
            exit: None,
        })?;
        self.operations.append(OperationRecord {
            timestamp: entry_date,
            asset: asset.clone(),
            side,
            direction: Direction::In,
            volume,
            price: entry_price,
            cost,
        });

        if side == Side::Buy {
            self.adjust_patrimony(entry_date, Adjustment::DecLiquidity, notional + cost);
        }
        self.adjust_patrimony(entry_date, Adjustment::DecBalance, cost);

        debug!(%asset, %side, volume, price = entry_price, cost, "position opened");
        self.positions
            .get_open(&asset)
            .ok_or(TradebookError::PositionNotFound { asset })
    }

    /// Closes the open position for `asset` and returns its realized result.
    pub fn close_position(
        &mut self,
        exit_date: NaiveDateTime,
        asset: &str,
        exit_price: f64,
    ) -> Result<f64, TradebookError> {
        let (position, exit) = self.positions.close(asset, exit_date, exit_price)?;
        let side = position.side;
        let volume = position.volume;
        let cost = volume as f64 * exit_price * self.cost_rate;

        self.operations.append(OperationRecord {
            timestamp: exit_date,
            asset: asset.to_string(),
            side: side.opposite(),
            direction: Direction::Out,
            volume,
            price: exit_price,
            cost,
        });

        if side == Side::Buy {
            let proceeds = volume as f64 * exit_price - cost;
            self.adjust_patrimony(exit_date, Adjustment::IncLiquidity, proceeds);
        }
        self.adjust_patrimony(exit_date, Adjustment::IncBalance, exit.realized_result);
        self.adjust_patrimony(exit_date, Adjustment::DecBalance, cost);

        debug!(
            %asset,
            %side,
            result = exit.realized_result,
            ret = exit.realized_return,
            cost,
            "position closed"
        );
        Ok(exit.realized_result)
    }

    /// Marks open positions to the panel close of `date`.
    pub fn mark_to_market(
        &mut self,
        timestamp: NaiveDateTime,
        panel: &PricePanel,
    ) -> Result<PatrimonySnapshot, TradebookError> {
        let unrealized = self
            .positions
            .unrealized_result_all(timestamp.date(), panel)?;
        Ok(self.adjust_patrimony(timestamp, Adjustment::MarkToMarket, unrealized))
    }

    pub fn raise_stop_loss(&mut self, asset: &str, stop_loss: f64) -> Result<(), TradebookError> {
        self.positions.raise_stop_loss(asset, stop_loss)
    }

    /// Shares to buy at `price`, rounded down to whole lots.
    ///
    /// The slot is the current balance split across the diversification
    /// count, capped at the initial capital's slot unless profits are
    /// reinvested.
    pub fn size_order(&self, price: f64) -> u64 {
        if price <= 0.0 {
            return 0;
        }
        let initial = self.ledger.initial_capital();
        let balance = self.ledger.balance();
        let base = if self.reinvest_profits || balance < initial {
            balance
        } else {
            initial
        };
        let allocation = base / self.max_diversification as f64;
        let lots = (allocation / LOT_SIZE as f64 / price).floor();
        if lots <= 0.0 {
            0
        } else {
            lots as u64 * LOT_SIZE
        }
    }

    pub fn passes_gate(&self) -> bool {
        self.curve.passes_gate()
    }

    pub fn has_open_position(&self, asset: &str) -> bool {
        self.positions.has_open_position(asset)
    }

    pub fn stop_loss(&self, asset: &str) -> Option<f64> {
        self.positions.stop_loss(asset)
    }

    pub fn stop_gain(&self, asset: &str) -> Option<f64> {
        self.positions.stop_gain(asset)
    }

    pub fn position_side(&self, asset: &str) -> Option<Side> {
        self.positions.position_side(asset)
    }

    pub fn open_position_count(&self) -> usize {
        self.positions.open_position_count()
    }

    pub fn unrealized_result(&self, asset: &str, price: f64) -> Option<f64> {
        self.positions.unrealized_result(asset, price)
    }

    pub fn unrealized_result_all(
        &self,
        date: NaiveDate,
        panel: &PricePanel,
    ) -> Result<f64, TradebookError> {
        self.positions.unrealized_result_all(date, panel)
    }

    pub fn open_capital(&self, date: NaiveDate, panel: &PricePanel) -> Result<f64, TradebookError> {
        self.positions.open_capital(date, panel)
    }

    pub fn has_liquidity(&self, amount: f64) -> bool {
        self.ledger.has_liquidity(amount)
    }

    pub fn ledger(&self) -> &PatrimonyLedger {
        &self.ledger
    }

    pub fn positions(&self) -> &PositionBook {
        &self.positions
    }

    pub fn operations(&self) -> &OperationLog {
        &self.operations
    }

    pub fn curve(&self) -> &DailyCapitalCurve {
        &self.curve
    }

    pub fn initial_capital(&self) -> f64 {
        self.initial_capital
    }

    pub fn max_diversification(&self) -> u32 {
        self.max_diversification
    }

    pub fn reinvest_profits(&self) -> bool {
        self.reinvest_profits
    }

    pub fn cost_rate(&self) -> f64 {
        self.cost_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn at(d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, d)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn config(capital: f64, cost_rate: f64) -> BacktestConfig {
        BacktestConfig {
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            initial_capital: capital,
            max_diversification: 2,
            reinvest_profits: true,
            cost_rate,
            ..BacktestConfig::default()
        }
    }

    fn order(asset: &str, side: Side, volume: u64, price: f64, d: u32) -> OpenOrder {
        OpenOrder {
            entry_date: at(d),
            asset: asset.into(),
            side,
            volume,
            entry_price: price,
            relative_strength: 0.5,
            stop_loss: None,
            stop_gain: None,
        }
    }

    #[test]
    fn new_book_deposits_initial_capital() {
        let book = TradingBook::new(&config(10_000.0, 0.001));
        assert_eq!(book.ledger().len(), 1);
        assert_relative_eq!(book.ledger().liquidity(), 10_000.0);
        assert_relative_eq!(book.ledger().balance(), 10_000.0);
        assert_relative_eq!(book.ledger().capital(), 10_000.0);
        assert_eq!(book.curve().len(), 1);
    }

    #[test]
    fn open_buy_charges_notional_and_cost() {
        let mut book = TradingBook::new(&config(10_000.0, 0.001));
        book.open_position(order("PETR4", Side::Buy, 100, 10.0, 2))
            .unwrap();

        assert_relative_eq!(book.ledger().liquidity(), 10_000.0 - 1000.0 - 1.0);
        assert_relative_eq!(book.ledger().balance(), 9_999.0);
        assert_eq!(book.ledger().len(), 3);

        let op = &book.operations().records()[0];
        assert_eq!(op.direction, Direction::In);
        assert_eq!(op.side, Side::Buy);
        assert_relative_eq!(op.cost, 1.0);
    }

    #[test]
    fn open_sell_charges_cost_only() {
        let mut book = TradingBook::new(&config(10_000.0, 0.001));
        book.open_position(order("PETR4", Side::Sell, 100, 10.0, 2))
            .unwrap();

        assert_relative_eq!(book.ledger().liquidity(), 10_000.0);
        assert_relative_eq!(book.ledger().balance(), 9_999.0);
        assert_eq!(book.ledger().len(), 2);
    }

    #[test]
    fn close_buy_with_profit() {
        let mut book = TradingBook::new(&config(10_000.0, 0.001));
        book.open_position(order("PETR4", Side::Buy, 100, 10.0, 2))
            .unwrap();
        let result = book.close_position(at(5), "PETR4", 12.0).unwrap();

        assert_relative_eq!(result, 200.0);
        let closed = &book.positions().all()[0];
        assert_relative_eq!(closed.realized_return().unwrap(), 0.2);

        // 10000 - 1001 + (1200 - 1.2)
        assert_relative_eq!(book.ledger().liquidity(), 10_197.8, epsilon = 1e-9);
        // 10000 - 1 + 200 - 1.2
        assert_relative_eq!(book.ledger().balance(), 10_197.8, epsilon = 1e-9);

        let out = &book.operations().records()[1];
        assert_eq!(out.direction, Direction::Out);
        assert_eq!(out.side, Side::Sell);
        assert_relative_eq!(out.cost, 1.2, epsilon = 1e-12);
    }

    #[test]
    fn close_sell_with_profit() {
        let mut book = TradingBook::new(&config(10_000.0, 0.001));
        book.open_position(order("PETR4", Side::Sell, 100, 10.0, 2))
            .unwrap();
        let result = book.close_position(at(5), "PETR4", 8.0).unwrap();

        assert_relative_eq!(result, 200.0);
        assert_relative_eq!(book.positions().all()[0].realized_return().unwrap(), 0.2);
        assert_relative_eq!(book.ledger().liquidity(), 10_000.0);
        assert_relative_eq!(book.ledger().balance(), 10_000.0 - 1.0 + 200.0 - 0.8, epsilon = 1e-9);
        assert_eq!(book.operations().records()[1].side, Side::Buy);
    }

    #[test]
    fn duplicate_open_leaves_ledgers_untouched() {
        let mut book = TradingBook::new(&config(10_000.0, 0.001));
        book.open_position(order("PETR4", Side::Buy, 100, 10.0, 2))
            .unwrap();
        let before = book.clone();

        let err = book
            .open_position(order("PETR4", Side::Buy, 100, 11.0, 3))
            .unwrap_err();
        assert!(matches!(err, TradebookError::DuplicatePosition { .. }));
        assert_eq!(book, before);
    }

    #[test]
    fn close_without_open_fails() {
        let mut book = TradingBook::new(&config(10_000.0, 0.001));
        let err = book.close_position(at(3), "VALE3", 50.0).unwrap_err();
        assert!(matches!(err, TradebookError::PositionNotFound { .. }));
        assert_eq!(book.ledger().len(), 1);
    }

    #[test]
    fn mark_to_market_uses_panel() {
        let mut book = TradingBook::new(&config(10_000.0, 0.0));
        book.open_position(order("PETR4", Side::Buy, 100, 10.0, 2))
            .unwrap();

        let mut panel = PricePanel::new();
        panel.insert(at(3).date(), "PETR4", 10.5);
        let snapshot = book.mark_to_market(at(3), &panel).unwrap();
        assert_relative_eq!(snapshot.capital, 10_050.0);
        assert_relative_eq!(snapshot.balance, 10_000.0);
    }

    #[test]
    fn size_order_examples() {
        let book = TradingBook::new(&config(10_000.0, 0.0));
        assert_eq!(book.size_order(33.0), 100);
        assert_eq!(book.size_order(3.3), 1500);
        assert_eq!(book.size_order(0.0), 0);
        assert_eq!(book.size_order(-1.0), 0);
        assert_eq!(book.size_order(60_000.0), 0);
    }

    #[test]
    fn size_order_caps_at_initial_without_reinvest() {
        let mut cfg = config(10_000.0, 0.0);
        cfg.reinvest_profits = false;
        let mut book = TradingBook::new(&cfg);
        book.adjust_patrimony(at(2), Adjustment::IncBalance, 10_000.0);
        assert_eq!(book.size_order(10.0), 500);

        cfg.reinvest_profits = true;
        let mut book = TradingBook::new(&cfg);
        book.adjust_patrimony(at(2), Adjustment::IncBalance, 10_000.0);
        assert_eq!(book.size_order(10.0), 1000);
    }

    #[test]
    fn size_order_follows_balance_below_initial() {
        let mut cfg = config(10_000.0, 0.0);
        cfg.reinvest_profits = false;
        let mut book = TradingBook::new(&cfg);
        book.adjust_patrimony(at(2), Adjustment::DecBalance, 4_000.0);
        assert_eq!(book.size_order(10.0), 300);
    }

    #[test]
    fn queries_delegate_to_position_book() {
        let mut book = TradingBook::new(&config(10_000.0, 0.0));
        let mut o = order("PETR4", Side::Sell, 100, 10.0, 2);
        o.stop_loss = Some(11.0);
        o.stop_gain = Some(8.0);
        book.open_position(o).unwrap();

        assert!(book.has_open_position("PETR4"));
        assert_eq!(book.position_side("PETR4"), Some(Side::Sell));
        assert_eq!(book.stop_loss("PETR4"), Some(11.0));
        assert_eq!(book.stop_gain("PETR4"), Some(8.0));
        book.raise_stop_loss("PETR4", 10.5).unwrap();
        assert_eq!(book.stop_loss("PETR4"), Some(10.5));
        assert_eq!(book.open_position_count(), 1);
        assert_abs_diff_eq!(book.unrealized_result("PETR4", 9.0).unwrap(), 100.0);
    }
}
