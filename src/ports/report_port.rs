//! Report generation port trait.

use crate::domain::backtest::BacktestConfig;
use crate::domain::error::TradebookError;
use crate::domain::metrics::Metrics;

/// Port for rendering and writing run reports.
pub trait ReportPort {
    fn render(&self, metrics: &Metrics, config: &BacktestConfig) -> String;

    /// Default implementation: writes the rendered report to `output_path`.
    fn write(
        &self,
        metrics: &Metrics,
        config: &BacktestConfig,
        output_path: &str,
    ) -> Result<(), TradebookError> {
        std::fs::write(output_path, self.render(metrics, config))?;
        Ok(())
    }
}
