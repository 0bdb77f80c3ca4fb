//! Position book: every position ever opened, with an index of the open ones.
//!
//! At most one position per asset may be open at a time.

use chrono::{NaiveDate, NaiveDateTime};
use std::collections::HashMap;

use super::error::TradebookError;
use super::position::{Position, PositionExit, Side};
use super::price_panel::PricePanel;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PositionBook {
    positions: Vec<Position>,
    open: HashMap<String, usize>,
}

impl PositionBook {
    pub fn new() -> Self {
        PositionBook::default()
    }

    /// Records a new open position. Fails if the asset already has one.
    pub fn open(&mut self, position: Position) -> Result<&Position, TradebookError> {
        if self.open.contains_key(&position.asset) {
            return Err(TradebookError::DuplicatePosition {
                asset: position.asset,
            });
        }
        let index = self.positions.len();
        self.open.insert(position.asset.clone(), index);
        self.positions.push(position);
        Ok(&self.positions[index])
    }

    /// Closes the open position for `asset`, returning the closed row.
    pub fn close(
        &mut self,
        asset: &str,
        date: NaiveDateTime,
        price: f64,
    ) -> Result<(&Position, PositionExit), TradebookError> {
        let index = self
            .open
            .remove(asset)
            .ok_or_else(|| TradebookError::PositionNotFound {
                asset: asset.to_string(),
            })?;
        let position = &mut self.positions[index];
        let exit = position.close(date, price);
        Ok((&self.positions[index], exit))
    }

    pub fn get_open(&self, asset: &str) -> Option<&Position> {
        self.open.get(asset).map(|&i| &self.positions[i])
    }

    pub fn has_open_position(&self, asset: &str) -> bool {
        self.open.contains_key(asset)
    }

    pub fn stop_loss(&self, asset: &str) -> Option<f64> {
        self.get_open(asset).and_then(|p| p.stop_loss)
    }

    pub fn stop_gain(&self, asset: &str) -> Option<f64> {
        self.get_open(asset).and_then(|p| p.stop_gain)
    }

    pub fn position_side(&self, asset: &str) -> Option<Side> {
        self.get_open(asset).map(|p| p.side)
    }

    /// Moves the stop loss of the open position. Callers only ever raise it.
    pub fn raise_stop_loss(&mut self, asset: &str, stop_loss: f64) -> Result<(), TradebookError> {
        let index = *self
            .open
            .get(asset)
            .ok_or_else(|| TradebookError::PositionNotFound {
                asset: asset.to_string(),
            })?;
        self.positions[index].stop_loss = Some(stop_loss);
        Ok(())
    }

    pub fn open_position_count(&self) -> usize {
        self.open.len()
    }

    pub fn unrealized_result(&self, asset: &str, price: f64) -> Option<f64> {
        self.get_open(asset).map(|p| p.unrealized_result(price))
    }

    /// Open positions in the order they were opened.
    pub fn open_positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.iter().filter(|p| p.is_open())
    }

    pub fn closed_positions(&self) -> impl Iterator<Item = &Position> {
        self.positions.iter().filter(|p| !p.is_open())
    }

    pub fn all(&self) -> &[Position] {
        &self.positions
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Unrealized result of every open position at the panel's close on `date`.
    pub fn unrealized_result_all(
        &self,
        date: NaiveDate,
        panel: &PricePanel,
    ) -> Result<f64, TradebookError> {
        self.open_positions().try_fold(0.0, |acc, p| {
            let price = panel.require_close(date, &p.asset)?;
            Ok(acc + p.unrealized_result(price))
        })
    }

    /// Market value of every open position at the panel's close on `date`.
    pub fn open_capital(&self, date: NaiveDate, panel: &PricePanel) -> Result<f64, TradebookError> {
        self.open_positions().try_fold(0.0, |acc, p| {
            let price = panel.require_close(date, &p.asset)?;
            Ok(acc + p.market_value(price))
        })
    }
}
