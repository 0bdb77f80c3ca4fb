//! Core domain types and logic: ledgers, trading books, gating and metrics.

pub mod backtest;
pub mod capital_curve;
pub mod config_validation;
pub mod error;
pub mod metrics;
pub mod operation;
pub mod patrimony;
pub mod portfolio;
pub mod position;
pub mod position_book;
pub mod price_panel;
pub mod replay;
pub mod signal;
pub mod trading_book;
