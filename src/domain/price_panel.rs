//! Date-indexed closing prices per asset.

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};

use super::error::TradebookError;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PricePanel {
    closes: BTreeMap<NaiveDate, HashMap<String, f64>>,
}

impl PricePanel {
    pub fn new() -> Self {
        PricePanel::default()
    }

    pub fn insert(&mut self, date: NaiveDate, asset: &str, close: f64) {
        self.closes
            .entry(date)
            .or_default()
            .insert(asset.to_string(), close);
    }

    pub fn close(&self, date: NaiveDate, asset: &str) -> Option<f64> {
        self.closes.get(&date).and_then(|row| row.get(asset)).copied()
    }

    pub fn require_close(&self, date: NaiveDate, asset: &str) -> Result<f64, TradebookError> {
        self.close(date, asset)
            .ok_or_else(|| TradebookError::MissingPrice {
                asset: asset.to_string(),
                date,
            })
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.closes.keys().copied()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.closes.keys().next().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.closes.keys().next_back().copied()
    }

    pub fn assets(&self) -> Vec<String> {
        let mut assets: Vec<String> = self
            .closes
            .values()
            .flat_map(|row| row.keys().cloned())
            .collect();
        assets.sort();
        assets.dedup();
        assets
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }
}
