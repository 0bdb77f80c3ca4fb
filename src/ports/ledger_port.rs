//! Ledger export port trait.

use crate::domain::error::TradebookError;
use crate::domain::trading_book::TradingBook;

pub trait LedgerSinkPort {
    fn export(&self, book: &TradingBook) -> Result<(), TradebookError>;
}
