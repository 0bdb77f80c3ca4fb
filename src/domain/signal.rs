//! Caller-issued trading events, in the order they are replayed.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use super::error::TradebookError;
use super::position::Side;

#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    Deposit {
        timestamp: NaiveDateTime,
        amount: f64,
    },
    Open {
        timestamp: NaiveDateTime,
        asset: String,
        side: Side,
        /// `None` sizes the entry from the execution book's balance.
        volume: Option<u64>,
        price: f64,
        relative_strength: f64,
        stop_loss: Option<f64>,
        stop_gain: Option<f64>,
    },
    Close {
        timestamp: NaiveDateTime,
        asset: String,
        price: f64,
    },
    /// Marks open positions to the panel close of the timestamp's day.
    Mark { timestamp: NaiveDateTime },
    RaiseStop {
        timestamp: NaiveDateTime,
        asset: String,
        stop_loss: f64,
    },
}

impl Signal {
    pub fn timestamp(&self) -> NaiveDateTime {
        match self {
            Signal::Deposit { timestamp, .. }
            | Signal::Open { timestamp, .. }
            | Signal::Close { timestamp, .. }
            | Signal::Mark { timestamp }
            | Signal::RaiseStop { timestamp, .. } => *timestamp,
        }
    }

    pub fn action(&self) -> &'static str {
        match self {
            Signal::Deposit { .. } => "deposit",
            Signal::Open { .. } => "open",
            Signal::Close { .. } => "close",
            Signal::Mark { .. } => "mark",
            Signal::RaiseStop { .. } => "raise_stop",
        }
    }
}

/// Parses `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS` or a bare
/// `YYYY-MM-DD` (midnight).
pub fn parse_timestamp(value: &str) -> Result<NaiveDateTime, TradebookError> {
    let value = value.trim();
    NaiveDateTime::parse_from_str(value, "%Y-%m-%d %H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S"))
        .or_else(|_| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d").map(|d| d.and_time(NaiveTime::MIN))
        })
        .map_err(|_| TradebookError::Data {
            reason: format!("invalid timestamp '{value}'"),
        })
}
