//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::info;

use crate::adapters::csv_adapter::{CsvPriceAdapter, CsvSignalAdapter};
use crate::adapters::csv_export_adapter::CsvLedgerExporter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::text_report_adapter::TextReportAdapter;
use crate::domain::backtest::BacktestConfig;
use crate::domain::config_validation::{
    parse_return_period, parse_sharpe_frequency, parse_start_date, validate_backtest_config,
    validate_data_config, validate_export_config, validate_filter_config,
};
use crate::domain::error::TradebookError;
use crate::domain::metrics::Metrics;
use crate::domain::portfolio::Portfolio;
use crate::domain::price_panel::PricePanel;
use crate::domain::replay::{replay, ReplaySummary};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::{PriceDataPort, SignalPort};
use crate::ports::ledger_port::LedgerSinkPort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "tradebook", about = "Portfolio backtest ledger and signal replay")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay a signal file against a price panel and report the results
    Run {
        #[arg(short, long)]
        config: PathBuf,
        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Export the ledgers as CSV into this directory
        #[arg(long)]
        export: Option<PathBuf>,
        #[arg(long)]
        prices: Option<PathBuf>,
        #[arg(long)]
        signals: Option<PathBuf>,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    let result = match cli.command {
        Command::Run {
            config,
            output,
            export,
            prices,
            signals,
        } => run_backtest(&config, output, export, prices, signals),
        Command::Validate { config } => run_validate(&config),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// Everything a replay produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub portfolio: Portfolio,
    pub panel: PricePanel,
    pub summary: ReplaySummary,
    pub metrics: Metrics,
}

pub fn build_backtest_config(adapter: &dyn ConfigPort) -> Result<BacktestConfig, TradebookError> {
    let defaults = BacktestConfig::default();

    let max_diversification = adapter.get_int(
        "backtest",
        "max_diversification",
        defaults.max_diversification as i64,
    );
    let max_diversification =
        u32::try_from(max_diversification).map_err(|_| TradebookError::ConfigInvalid {
            section: "backtest".into(),
            key: "max_diversification".into(),
            reason: format!("{max_diversification} is out of range"),
        })?;

    let sma_window = adapter.get_int("filter", "sma_window", defaults.sma_window as i64);
    let sma_window = usize::try_from(sma_window).map_err(|_| TradebookError::ConfigInvalid {
        section: "filter".into(),
        key: "sma_window".into(),
        reason: format!("{sma_window} is out of range"),
    })?;

    Ok(BacktestConfig {
        start_date: parse_start_date(adapter)?,
        initial_capital: adapter.get_double("backtest", "initial_capital", defaults.initial_capital),
        max_diversification,
        reinvest_profits: adapter.get_bool("backtest", "reinvest_profits", defaults.reinvest_profits),
        cost_rate: adapter.get_double("backtest", "cost_rate", defaults.cost_rate),
        filter_enabled: adapter.get_bool("filter", "enabled", defaults.filter_enabled),
        sma_window,
        risk_free_rate: adapter.get_double("backtest", "risk_free_rate", defaults.risk_free_rate),
        sharpe_frequency: parse_sharpe_frequency(adapter)?,
        return_period: parse_return_period(adapter)?,
    })
}

/// Relative paths in the config file are taken from the config's directory.
pub fn resolve_path(config_path: &Path, value: &str) -> PathBuf {
    let path = PathBuf::from(value.trim());
    if path.is_absolute() {
        return path;
    }
    match config_path.parent() {
        Some(dir) => dir.join(path),
        None => path,
    }
}

fn configured_path(
    adapter: &dyn ConfigPort,
    config_path: &Path,
    section: &str,
    key: &str,
) -> Option<PathBuf> {
    adapter
        .get_string(section, key)
        .filter(|s| !s.trim().is_empty())
        .map(|s| resolve_path(config_path, &s))
}

fn validate_all(adapter: &dyn ConfigPort) -> Result<(), TradebookError> {
    validate_backtest_config(adapter)?;
    validate_filter_config(adapter)?;
    validate_export_config(adapter)?;
    Ok(())
}

/// Loads both inputs, replays the signals and computes the metrics of the
/// execution book.
pub fn run_backtest_pipeline(
    config: &BacktestConfig,
    prices: &dyn PriceDataPort,
    signals: &dyn SignalPort,
) -> Result<RunOutcome, TradebookError> {
    let panel = prices.load_prices()?;
    info!(days = panel.len(), assets = panel.assets().len(), "price panel loaded");

    let signals = signals.load_signals()?;
    info!(count = signals.len(), "signals loaded");

    let mut portfolio = Portfolio::new(config);
    let summary = replay(&mut portfolio, &signals, &panel)?;
    let metrics = Metrics::compute(portfolio.execution(), &panel, config)?;

    Ok(RunOutcome {
        portfolio,
        panel,
        summary,
        metrics,
    })
}

fn run_backtest(
    config_path: &Path,
    output: Option<PathBuf>,
    export: Option<PathBuf>,
    prices_override: Option<PathBuf>,
    signals_override: Option<PathBuf>,
) -> Result<(), TradebookError> {
    // Stage 1: load and validate config
    info!(path = %config_path.display(), "loading config");
    let adapter = FileConfigAdapter::from_file(config_path)?;
    validate_all(&adapter)?;
    let config = build_backtest_config(&adapter)?;

    // Stage 2: resolve inputs, command line first
    let prices_path = match prices_override {
        Some(p) => p,
        None => configured_path(&adapter, config_path, "data", "prices").ok_or_else(|| {
            TradebookError::ConfigMissing {
                section: "data".into(),
                key: "prices".into(),
            }
        })?,
    };
    let signals_path = match signals_override {
        Some(p) => p,
        None => configured_path(&adapter, config_path, "data", "signals").ok_or_else(|| {
            TradebookError::ConfigMissing {
                section: "data".into(),
                key: "signals".into(),
            }
        })?,
    };

    // Stage 3: replay and metrics
    let outcome = run_backtest_pipeline(
        &config,
        &CsvPriceAdapter::new(prices_path),
        &CsvSignalAdapter::new(signals_path),
    )?;

    // Stage 4: report
    let reporter = TextReportAdapter;
    match output {
        Some(path) => {
            reporter.write(&outcome.metrics, &config, &path.to_string_lossy())?;
            info!(path = %path.display(), "report written");
        }
        None => print!("{}", reporter.render(&outcome.metrics, &config)),
    }

    // Stage 5: optional ledger export
    let export_dir = export.or_else(|| configured_path(&adapter, config_path, "export", "directory"));
    if let Some(dir) = export_dir {
        let decimals = adapter.get_int("export", "decimals", 2) as i32;
        CsvLedgerExporter::new(dir.clone(), decimals).export(outcome.portfolio.execution())?;
        if let Some(reference) = outcome.portfolio.reference() {
            CsvLedgerExporter::new(dir.join("reference"), decimals).export(reference)?;
        }
    }

    Ok(())
}

fn run_validate(config_path: &Path) -> Result<(), TradebookError> {
    eprintln!("Validating config: {}", config_path.display());
    let adapter = FileConfigAdapter::from_file(config_path)?;
    validate_all(&adapter)?;
    validate_data_config(&adapter)?;
    let config = build_backtest_config(&adapter)?;

    eprintln!("  start date:          {}", config.start_date);
    eprintln!("  initial capital:     {}", config.initial_capital);
    eprintln!("  max diversification: {}", config.max_diversification);
    eprintln!("  reinvest profits:    {}", config.reinvest_profits);
    eprintln!("  cost rate:           {}", config.cost_rate);
    if config.filter_enabled {
        eprintln!("  capital filter:      SMA {}", config.sma_window);
    } else {
        eprintln!("  capital filter:      disabled");
    }
    eprintln!("  sharpe frequency:    {}", config.sharpe_frequency.as_str());
    eprintln!("  return period:       {}", config.return_period.code());
    eprintln!("\nConfiguration is valid.");
    Ok(())
}
