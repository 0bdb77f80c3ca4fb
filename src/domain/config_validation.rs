//! Configuration validation.
//!
//! Validates every config field before a run starts.

use crate::domain::error::TradebookError;
use crate::domain::metrics::{ReturnPeriod, SharpeFrequency};
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), TradebookError> {
    validate_initial_capital(config)?;
    validate_max_diversification(config)?;
    validate_cost_rate(config)?;
    validate_risk_free_rate(config)?;
    parse_start_date(config)?;
    parse_sharpe_frequency(config)?;
    parse_return_period(config)?;
    Ok(())
}

pub fn validate_filter_config(config: &dyn ConfigPort) -> Result<(), TradebookError> {
    let window = config.get_int("filter", "sma_window", 5);
    if window < 1 {
        return Err(TradebookError::ConfigInvalid {
            section: "filter".to_string(),
            key: "sma_window".to_string(),
            reason: "sma_window must be at least 1".to_string(),
        });
    }
    Ok(())
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), TradebookError> {
    for key in ["prices", "signals"] {
        match config.get_string("data", key) {
            Some(s) if !s.trim().is_empty() => {}
            _ => {
                return Err(TradebookError::ConfigMissing {
                    section: "data".to_string(),
                    key: key.to_string(),
                });
            }
        }
    }
    Ok(())
}

pub fn validate_export_config(config: &dyn ConfigPort) -> Result<(), TradebookError> {
    let decimals = config.get_int("export", "decimals", 2);
    if !(0..=10).contains(&decimals) {
        return Err(TradebookError::ConfigInvalid {
            section: "export".to_string(),
            key: "decimals".to_string(),
            reason: "decimals must be between 0 and 10".to_string(),
        });
    }
    Ok(())
}

fn validate_initial_capital(config: &dyn ConfigPort) -> Result<(), TradebookError> {
    if config.get_string("backtest", "initial_capital").is_none() {
        return Err(TradebookError::ConfigMissing {
            section: "backtest".to_string(),
            key: "initial_capital".to_string(),
        });
    }
    let value = config.get_double("backtest", "initial_capital", 0.0);
    if value <= 0.0 {
        return Err(TradebookError::ConfigInvalid {
            section: "backtest".to_string(),
            key: "initial_capital".to_string(),
            reason: "initial_capital must be positive".to_string(),
        });
    }
    Ok(())
}

fn validate_max_diversification(config: &dyn ConfigPort) -> Result<(), TradebookError> {
    let value = config.get_int("backtest", "max_diversification", 10);
    if value < 1 || value > u32::MAX as i64 {
        return Err(TradebookError::ConfigInvalid {
            section: "backtest".to_string(),
            key: "max_diversification".to_string(),
            reason: "max_diversification must be at least 1".to_string(),
        });
    }
    Ok(())
}

fn validate_cost_rate(config: &dyn ConfigPort) -> Result<(), TradebookError> {
    let value = config.get_double("backtest", "cost_rate", 0.0);
    if value < 0.0 {
        return Err(TradebookError::ConfigInvalid {
            section: "backtest".to_string(),
            key: "cost_rate".to_string(),
            reason: "cost_rate must be non-negative".to_string(),
        });
    }
    Ok(())
}

fn validate_risk_free_rate(config: &dyn ConfigPort) -> Result<(), TradebookError> {
    let value = config.get_double("backtest", "risk_free_rate", 0.0);
    if !(0.0..1.0).contains(&value) {
        return Err(TradebookError::ConfigInvalid {
            section: "backtest".to_string(),
            key: "risk_free_rate".to_string(),
            reason: "risk_free_rate must be between 0 and 1".to_string(),
        });
    }
    Ok(())
}

pub fn parse_start_date(config: &dyn ConfigPort) -> Result<NaiveDate, TradebookError> {
    match config.get_string("backtest", "start_date") {
        None => Err(TradebookError::ConfigMissing {
            section: "backtest".to_string(),
            key: "start_date".to_string(),
        }),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
            TradebookError::ConfigInvalid {
                section: "backtest".to_string(),
                key: "start_date".to_string(),
                reason: "invalid start_date format, expected YYYY-MM-DD".to_string(),
            }
        }),
    }
}

pub fn parse_sharpe_frequency(config: &dyn ConfigPort) -> Result<SharpeFrequency, TradebookError> {
    match config.get_string("backtest", "sharpe_frequency") {
        None => Ok(SharpeFrequency::Daily),
        Some(s) => s.parse().map_err(|_| TradebookError::ConfigInvalid {
            section: "backtest".to_string(),
            key: "sharpe_frequency".to_string(),
            reason: format!("unknown frequency '{s}', expected daily, weekly or monthly"),
        }),
    }
}

pub fn parse_return_period(config: &dyn ConfigPort) -> Result<ReturnPeriod, TradebookError> {
    match config.get_string("backtest", "return_period") {
        None => Ok(ReturnPeriod::Annual),
        Some(s) => s.parse().map_err(|_| TradebookError::ConfigInvalid {
            section: "backtest".to_string(),
            key: "return_period".to_string(),
            reason: format!("unknown period '{s}', expected one of D, W, M, Q, A, Y"),
        }),
    }
}
