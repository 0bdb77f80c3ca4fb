//! CSV file adapters for the price panel and the signal sequence.

use crate::domain::error::TradebookError;
use crate::domain::position::Side;
use crate::domain::price_panel::PricePanel;
use crate::domain::signal::{Signal, parse_timestamp};
use crate::ports::data_port::{PriceDataPort, SignalPort};
use chrono::NaiveDate;
use csv::StringRecord;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

fn open_csv(path: &Path) -> Result<csv::Reader<fs::File>, TradebookError> {
    let file = fs::File::open(path).map_err(|e| TradebookError::Data {
        reason: format!("failed to read {}: {}", path.display(), e),
    })?;
    Ok(csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(file))
}

/// Column lookup by header name.
struct Columns {
    index: HashMap<String, usize>,
}

impl Columns {
    fn new(headers: &StringRecord) -> Self {
        let index = headers
            .iter()
            .enumerate()
            .map(|(i, h)| (h.to_lowercase(), i))
            .collect();
        Columns { index }
    }

    fn require(&self, name: &str) -> Result<(), TradebookError> {
        if self.index.contains_key(name) {
            Ok(())
        } else {
            Err(TradebookError::Data {
                reason: format!("missing {name} column"),
            })
        }
    }

    /// Non-empty cell value, or `None` for a blank or absent cell.
    fn get<'r>(&self, record: &'r StringRecord, name: &str) -> Option<&'r str> {
        self.index
            .get(name)
            .and_then(|&i| record.get(i))
            .filter(|v| !v.is_empty())
    }

    fn text<'r>(&self, record: &'r StringRecord, name: &str, line: u64) -> Result<&'r str, TradebookError> {
        self.get(record, name).ok_or_else(|| TradebookError::Data {
            reason: format!("line {line}: missing {name} value"),
        })
    }

    fn number(&self, record: &StringRecord, name: &str, line: u64) -> Result<f64, TradebookError> {
        parse_number(self.text(record, name, line)?, name, line)
    }

    fn optional_number(
        &self,
        record: &StringRecord,
        name: &str,
        line: u64,
    ) -> Result<Option<f64>, TradebookError> {
        self.get(record, name)
            .map(|v| parse_number(v, name, line))
            .transpose()
    }
}

fn parse_number(value: &str, name: &str, line: u64) -> Result<f64, TradebookError> {
    value.parse().map_err(|e| TradebookError::Data {
        reason: format!("line {line}: invalid {name} value: {e}"),
    })
}

fn record_line(record: &StringRecord) -> u64 {
    record.position().map(|p| p.line()).unwrap_or(0)
}

/// Long-format price panel: `date,asset,close`. Blank closes are skipped.
pub struct CsvPriceAdapter {
    path: PathBuf,
}

impl CsvPriceAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl PriceDataPort for CsvPriceAdapter {
    fn load_prices(&self) -> Result<PricePanel, TradebookError> {
        let mut rdr = open_csv(&self.path)?;
        let headers = rdr.headers().map_err(|e| TradebookError::Data {
            reason: format!("CSV parse error: {}", e),
        })?;
        let columns = Columns::new(headers);
        for name in ["date", "asset", "close"] {
            columns.require(name)?;
        }

        let mut panel = PricePanel::new();
        for result in rdr.records() {
            let record = result.map_err(|e| TradebookError::Data {
                reason: format!("CSV parse error: {}", e),
            })?;
            let line = record_line(&record);

            let date_str = columns.text(&record, "date", line)?;
            let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|e| {
                TradebookError::Data {
                    reason: format!("line {line}: invalid date format: {}", e),
                }
            })?;
            let asset = columns.text(&record, "asset", line)?;
            match columns.optional_number(&record, "close", line)? {
                Some(close) => panel.insert(date, asset, close),
                None => debug!(%date, asset, "blank close skipped"),
            }
        }

        debug!(path = %self.path.display(), days = panel.len(), "price panel loaded");
        Ok(panel)
    }
}

/// Signal file with columns `timestamp,action,asset,side,volume,price,
/// relative_strength,stop_loss,stop_gain,amount`. Only the columns an action
/// needs must be filled.
pub struct CsvSignalAdapter {
    path: PathBuf,
}

impl CsvSignalAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn parse_record(columns: &Columns, record: &StringRecord) -> Result<Signal, TradebookError> {
        let line = record_line(record);
        let timestamp = parse_timestamp(columns.text(record, "timestamp", line)?)?;
        let action = columns.text(record, "action", line)?.to_lowercase();

        let signal = match action.as_str() {
            "deposit" => Signal::Deposit {
                timestamp,
                amount: columns.number(record, "amount", line)?,
            },
            "open" => {
                let side_str = columns.text(record, "side", line)?;
                let side = Side::parse(side_str).ok_or_else(|| TradebookError::Data {
                    reason: format!("line {line}: invalid side '{side_str}'"),
                })?;
                let volume = columns
                    .get(record, "volume")
                    .map(|v| {
                        v.parse::<u64>().map_err(|e| TradebookError::Data {
                            reason: format!("line {line}: invalid volume value: {e}"),
                        })
                    })
                    .transpose()?;
                Signal::Open {
                    timestamp,
                    asset: columns.text(record, "asset", line)?.to_string(),
                    side,
                    volume,
                    price: columns.number(record, "price", line)?,
                    relative_strength: columns
                        .optional_number(record, "relative_strength", line)?
                        .unwrap_or(0.0),
                    stop_loss: columns.optional_number(record, "stop_loss", line)?,
                    stop_gain: columns.optional_number(record, "stop_gain", line)?,
                }
            }
            "close" => Signal::Close {
                timestamp,
                asset: columns.text(record, "asset", line)?.to_string(),
                price: columns.number(record, "price", line)?,
            },
            "mark" => Signal::Mark { timestamp },
            "raise_stop" => Signal::RaiseStop {
                timestamp,
                asset: columns.text(record, "asset", line)?.to_string(),
                stop_loss: columns.number(record, "stop_loss", line)?,
            },
            other => {
                return Err(TradebookError::Data {
                    reason: format!("line {line}: unknown action '{other}'"),
                });
            }
        };
        Ok(signal)
    }
}

impl SignalPort for CsvSignalAdapter {
    fn load_signals(&self) -> Result<Vec<Signal>, TradebookError> {
        let mut rdr = open_csv(&self.path)?;
        let headers = rdr.headers().map_err(|e| TradebookError::Data {
            reason: format!("CSV parse error: {}", e),
        })?;
        let columns = Columns::new(headers);
        columns.require("timestamp")?;
        columns.require("action")?;

        let mut signals = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| TradebookError::Data {
                reason: format!("CSV parse error: {}", e),
            })?;
            signals.push(Self::parse_record(&columns, &record)?);
        }

        debug!(path = %self.path.display(), count = signals.len(), "signals loaded");
        Ok(signals)
    }
}
