//! Plain-text report adapter implementing ReportPort.
//!
//! Renders run parameters, the metrics block and the periodic return table
//! as aligned columns. Undefined metrics print as `n/a`.

use crate::domain::backtest::BacktestConfig;
use crate::domain::metrics::Metrics;
use crate::domain::position::round_to;
use crate::ports::report_port::ReportPort;

const LABEL_WIDTH: usize = 30;
const UNDEFINED: &str = "n/a";

pub struct TextReportAdapter;

/// Formats money with thousands separators and two decimals, e.g.
/// `-1,234,567.89`.
pub fn format_money(value: f64) -> String {
    if !value.is_finite() {
        return UNDEFINED.to_string();
    }
    let rounded = round_to(value, 2);
    let sign = if rounded < 0.0 { "-" } else { "" };
    let cents = (rounded.abs() * 100.0).round() as u64;
    let digits = (cents / 100).to_string();

    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{sign}{grouped}.{:02}", cents % 100)
}

fn money(value: Option<f64>) -> String {
    value.map(format_money).unwrap_or_else(|| UNDEFINED.to_string())
}

/// Fraction rendered as a percentage.
fn percent(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.2}%", v * 100.0))
        .unwrap_or_else(|| UNDEFINED.to_string())
}

/// Value already expressed in percent.
fn percent_points(value: Option<f64>) -> String {
    value
        .map(|v| format!("{v:.2}%"))
        .unwrap_or_else(|| UNDEFINED.to_string())
}

fn ratio(value: Option<f64>) -> String {
    value
        .map(|v| format!("{v:.4}"))
        .unwrap_or_else(|| UNDEFINED.to_string())
}

fn push_row(out: &mut String, label: &str, value: impl AsRef<str>) {
    out.push_str(&format!("{label:<width$}{}\n", value.as_ref(), width = LABEL_WIDTH));
}

fn push_heading(out: &mut String, title: &str) {
    if !out.is_empty() {
        out.push('\n');
    }
    out.push_str(&format!("=== {title} ===\n"));
}

impl TextReportAdapter {
    fn render_parameters(out: &mut String, config: &BacktestConfig) {
        push_heading(out, "Parameters");
        push_row(out, "Start date", config.start_date.to_string());
        push_row(out, "Initial capital", format_money(config.initial_capital));
        push_row(out, "Max diversification", config.max_diversification.to_string());
        push_row(
            out,
            "Reinvest profits",
            if config.reinvest_profits { "yes" } else { "no" },
        );
        push_row(out, "Cost rate", format!("{:.4}%", config.cost_rate * 100.0));
        let filter = if config.filter_enabled {
            format!("enabled (SMA {})", config.sma_window)
        } else {
            "disabled".to_string()
        };
        push_row(out, "Capital curve filter", filter);
        push_row(out, "Risk-free rate", percent(Some(config.risk_free_rate)));
        push_row(out, "Sharpe frequency", config.sharpe_frequency.as_str());
        push_row(out, "Return period", config.return_period.code());
    }

    fn render_results(out: &mut String, m: &Metrics) {
        push_heading(out, "Results");
        push_row(out, "Initial capital", format_money(m.initial_capital));
        push_row(out, "Final balance", format_money(m.final_balance));
        push_row(out, "Net profit", format_money(m.net_profit));
        push_row(out, "Net return", percent_points(Some(m.net_return_pct)));
        push_row(
            out,
            &format!("Mean return per period ({})", m.return_period.code()),
            percent(m.mean_periodic_return),
        );
        push_row(out, "Max drawdown", money(m.max_drawdown_abs));
        push_row(out, "Max drawdown (%)", percent_points(m.max_drawdown_pct));
        push_row(out, "Recovery factor", ratio(Some(m.recovery_factor)));
        push_row(out, "Sharpe ratio", ratio(m.sharpe_ratio));

        push_heading(out, "Trades");
        push_row(out, "Positions", m.total_positions.to_string());
        push_row(out, "Closed positions", m.closed_positions.to_string());
        push_row(out, "Operations", m.total_operations.to_string());
        push_row(out, "Hit rate", percent(m.hit_rate));
        push_row(out, "Payoff", ratio(m.payoff));
        push_row(out, "Profit factor", ratio(m.profit_factor));
        push_row(out, "Expectancy", money(m.expectancy));
        push_row(out, "Normalized expectancy", ratio(m.normalized_expectancy));
        push_row(out, "Mean win", money(m.mean_win));
        push_row(out, "Mean loss", money(m.mean_loss));
        push_row(out, "Mean win (%)", percent(m.mean_win_return));
        push_row(out, "Mean loss (%)", percent(m.mean_loss_return));
        push_row(out, "Profit per position", money(m.profit_per_position));
        push_row(out, "Return per position", percent(m.return_per_position));

        push_heading(out, "Open book");
        push_row(out, "Open result", money(m.open_result));
        push_row(out, "Open capital", money(m.open_capital));
        push_row(out, "Current capital", format_money(m.current_capital));
        push_row(out, "Current liquidity", format_money(m.current_liquidity));
    }

    fn render_periodic_returns(out: &mut String, m: &Metrics) {
        push_heading(out, &format!("Periodic returns ({})", m.return_period.code()));
        if m.periodic_returns.is_empty() {
            out.push_str("(none)\n");
            return;
        }
        out.push_str(&format!("{:<12}{:>20}{:>12}\n", "Period end", "Capital", "Return"));
        for row in &m.periodic_returns {
            out.push_str(&format!(
                "{:<12}{:>20}{:>12}\n",
                row.period_end.to_string(),
                format_money(row.capital),
                percent(row.change)
            ));
        }
    }
}

impl ReportPort for TextReportAdapter {
    fn render(&self, metrics: &Metrics, config: &BacktestConfig) -> String {
        let mut out = String::new();
        Self::render_parameters(&mut out, config);
        Self::render_results(&mut out, metrics);
        Self::render_periodic_returns(&mut out, metrics);
        out
    }
}
