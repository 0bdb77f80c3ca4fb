#![allow(dead_code)]

use chrono::{NaiveDate, NaiveDateTime};
use std::cell::Cell;
use tradebook::domain::backtest::BacktestConfig;
use tradebook::domain::error::TradebookError;
use tradebook::domain::position::Side;
use tradebook::domain::price_panel::PricePanel;
use tradebook::domain::signal::Signal;
use tradebook::domain::trading_book::OpenOrder;
use tradebook::ports::data_port::{PriceDataPort, SignalPort};

pub struct MockPriceData {
    pub panel: PricePanel,
    pub error: Option<String>,
}

impl MockPriceData {
    pub fn new(panel: PricePanel) -> Self {
        Self { panel, error: None }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            panel: PricePanel::new(),
            error: Some(reason.to_string()),
        }
    }
}

impl PriceDataPort for MockPriceData {
    fn load_prices(&self) -> Result<PricePanel, TradebookError> {
        match &self.error {
            Some(reason) => Err(TradebookError::Data {
                reason: reason.clone(),
            }),
            None => Ok(self.panel.clone()),
        }
    }
}

pub struct MockSignals {
    pub signals: Vec<Signal>,
    pub loads: Cell<usize>,
}

impl MockSignals {
    pub fn new(signals: Vec<Signal>) -> Self {
        Self {
            signals,
            loads: Cell::new(0),
        }
    }
}

impl SignalPort for MockSignals {
    fn load_signals(&self) -> Result<Vec<Signal>, TradebookError> {
        self.loads.set(self.loads.get() + 1);
        Ok(self.signals.clone())
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
    date(y, m, d).and_hms_opt(18, 0, 0).unwrap()
}

pub fn sample_config() -> BacktestConfig {
    BacktestConfig {
        start_date: date(2024, 1, 1),
        initial_capital: 100_000.0,
        max_diversification: 10,
        reinvest_profits: true,
        cost_rate: 0.0005,
        filter_enabled: false,
        sma_window: 5,
        ..BacktestConfig::default()
    }
}

pub fn order(asset: &str, side: Side, volume: u64, price: f64, ts: NaiveDateTime) -> OpenOrder {
    OpenOrder {
        entry_date: ts,
        asset: asset.to_string(),
        side,
        volume,
        entry_price: price,
        relative_strength: 0.0,
        stop_loss: None,
        stop_gain: None,
    }
}

pub fn open_signal(asset: &str, side: Side, volume: Option<u64>, price: f64, ts: NaiveDateTime) -> Signal {
    Signal::Open {
        timestamp: ts,
        asset: asset.to_string(),
        side,
        volume,
        price,
        relative_strength: 0.0,
        stop_loss: None,
        stop_gain: None,
    }
}

pub fn close_signal(asset: &str, price: f64, ts: NaiveDateTime) -> Signal {
    Signal::Close {
        timestamp: ts,
        asset: asset.to_string(),
        price,
    }
}

/// Daily closes for `asset` starting at `start`, one per calendar day.
pub fn panel_from_closes(asset: &str, start: NaiveDate, closes: &[f64]) -> PricePanel {
    let mut panel = PricePanel::new();
    for (i, &close) in closes.iter().enumerate() {
        panel.insert(start + chrono::Duration::days(i as i64), asset, close);
    }
    panel
}
