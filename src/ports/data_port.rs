//! Market data and signal input ports.

use crate::domain::error::TradebookError;
use crate::domain::price_panel::PricePanel;
use crate::domain::signal::Signal;

pub trait PriceDataPort {
    fn load_prices(&self) -> Result<PricePanel, TradebookError>;
}

pub trait SignalPort {
    /// Signals in file order. Ordering is checked by the replay.
    fn load_signals(&self) -> Result<Vec<Signal>, TradebookError>;
}
