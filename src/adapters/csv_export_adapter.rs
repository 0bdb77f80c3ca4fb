//! CSV export of a trading book's ledgers.
//!
//! Writes `patrimony.csv`, `positions.csv`, `operations.csv` and
//! `daily_capital.csv` into one directory. Money columns are rounded to the
//! configured number of decimals.

use crate::domain::error::TradebookError;
use crate::domain::position::round_to;
use crate::domain::trading_book::TradingBook;
use crate::ports::ledger_port::LedgerSinkPort;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub struct CsvLedgerExporter {
    directory: PathBuf,
    decimals: i32,
}

impl CsvLedgerExporter {
    pub fn new(directory: PathBuf, decimals: i32) -> Self {
        Self {
            directory,
            decimals,
        }
    }

    fn money(&self, value: f64) -> String {
        round_to(value, self.decimals).to_string()
    }

    fn optional_money(&self, value: Option<f64>) -> String {
        value.map(|v| self.money(v)).unwrap_or_default()
    }

    fn writer(&self, name: &str) -> Result<csv::Writer<fs::File>, TradebookError> {
        let path = self.directory.join(name);
        csv::Writer::from_path(&path).map_err(|e| csv_error(&path, e))
    }

    fn write_patrimony(&self, book: &TradingBook) -> Result<(), TradebookError> {
        let path = self.directory.join("patrimony.csv");
        let mut wtr = self.writer("patrimony.csv")?;
        wtr.write_record(["timestamp", "liquidity", "balance", "capital"])
            .map_err(|e| csv_error(&path, e))?;
        for s in book.ledger().snapshots() {
            wtr.write_record([
                s.timestamp.format(DATETIME_FORMAT).to_string(),
                self.money(s.liquidity),
                self.money(s.balance),
                self.money(s.capital),
            ])
            .map_err(|e| csv_error(&path, e))?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn write_positions(&self, book: &TradingBook) -> Result<(), TradebookError> {
        let path = self.directory.join("positions.csv");
        let mut wtr = self.writer("positions.csv")?;
        wtr.write_record([
            "asset",
            "side",
            "volume",
            "entry_date",
            "entry_price",
            "exit_date",
            "exit_price",
            "relative_strength",
            "stop_loss",
            "stop_gain",
            "realized_result",
            "realized_return",
        ])
        .map_err(|e| csv_error(&path, e))?;

        for p in book.positions().all() {
            let exit_date = p
                .exit
                .map(|e| e.date.format(DATETIME_FORMAT).to_string())
                .unwrap_or_default();
            wtr.write_record([
                p.asset.clone(),
                p.side.to_string(),
                p.volume.to_string(),
                p.entry_date.format(DATETIME_FORMAT).to_string(),
                self.money(p.entry_price),
                exit_date,
                self.optional_money(p.exit.map(|e| e.price)),
                p.relative_strength.to_string(),
                self.optional_money(p.stop_loss),
                self.optional_money(p.stop_gain),
                self.optional_money(p.realized_result()),
                p.realized_return().map(|r| r.to_string()).unwrap_or_default(),
            ])
            .map_err(|e| csv_error(&path, e))?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn write_operations(&self, book: &TradingBook) -> Result<(), TradebookError> {
        let path = self.directory.join("operations.csv");
        let mut wtr = self.writer("operations.csv")?;
        wtr.write_record(["timestamp", "asset", "side", "direction", "volume", "price", "cost"])
            .map_err(|e| csv_error(&path, e))?;
        for op in book.operations().records() {
            wtr.write_record([
                op.timestamp.format(DATETIME_FORMAT).to_string(),
                op.asset.clone(),
                op.side.to_string(),
                op.direction.to_string(),
                op.volume.to_string(),
                self.money(op.price),
                self.money(op.cost),
            ])
            .map_err(|e| csv_error(&path, e))?;
        }
        wtr.flush()?;
        Ok(())
    }

    fn write_daily_capital(&self, book: &TradingBook) -> Result<(), TradebookError> {
        let path = self.directory.join("daily_capital.csv");
        let mut wtr = self.writer("daily_capital.csv")?;
        wtr.write_record(["date", "balance", "capital", "moving_average"])
            .map_err(|e| csv_error(&path, e))?;
        for row in book.curve().rows() {
            wtr.write_record([
                row.date.to_string(),
                self.money(row.balance),
                self.money(row.capital),
                self.optional_money(row.moving_average),
            ])
            .map_err(|e| csv_error(&path, e))?;
        }
        wtr.flush()?;
        Ok(())
    }
}

fn csv_error(path: &Path, e: csv::Error) -> TradebookError {
    TradebookError::Data {
        reason: format!("failed to write {}: {}", path.display(), e),
    }
}

impl LedgerSinkPort for CsvLedgerExporter {
    fn export(&self, book: &TradingBook) -> Result<(), TradebookError> {
        fs::create_dir_all(&self.directory)?;
        self.write_patrimony(book)?;
        self.write_positions(book)?;
        self.write_operations(book)?;
        self.write_daily_capital(book)?;
        info!(directory = %self.directory.display(), "ledgers exported");
        Ok(())
    }
}
