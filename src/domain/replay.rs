//! Signal replay: drives a [`Portfolio`] through an ordered signal sequence.

use tracing::{debug, info};

use super::error::TradebookError;
use super::patrimony::Adjustment;
use super::portfolio::Portfolio;
use super::price_panel::PricePanel;
use super::signal::Signal;
use super::trading_book::OpenOrder;

/// Counters describing what a replay did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ReplaySummary {
    pub signals: usize,
    pub deposits: usize,
    /// Entries taken by the execution book.
    pub opened: usize,
    pub gated: usize,
    /// Entries sized to zero shares.
    pub skipped: usize,
    /// Exits from the execution book. Exits of gated entries touch only the
    /// reference book and are not counted.
    pub closed: usize,
    pub marks: usize,
    pub stop_raises: usize,
}

/// Replays `signals` in order. Timestamps must not go backwards; the first
/// ledger error aborts the replay.
pub fn replay(
    portfolio: &mut Portfolio,
    signals: &[Signal],
    panel: &PricePanel,
) -> Result<ReplaySummary, TradebookError> {
    let mut summary = ReplaySummary::default();
    // Nothing may precede the ledger's latest entry, the opening deposit included.
    let mut previous = portfolio.execution().ledger().last().map(|s| s.timestamp);

    for signal in signals {
        let timestamp = signal.timestamp();
        if let Some(prev) = previous {
            if timestamp < prev {
                return Err(TradebookError::Data {
                    reason: format!("signal at {timestamp} precedes {prev}"),
                });
            }
        }
        previous = Some(timestamp);
        summary.signals += 1;

        match signal {
            Signal::Deposit { amount, .. } => {
                portfolio.adjust_patrimony(timestamp, Adjustment::Deposit, *amount);
                summary.deposits += 1;
            }
            Signal::Open {
                asset,
                side,
                volume,
                price,
                relative_strength,
                stop_loss,
                stop_gain,
                ..
            } => {
                let volume = volume.unwrap_or_else(|| portfolio.size_order(*price));
                if volume == 0 {
                    debug!(%asset, price, "entry sized to zero, skipped");
                    summary.skipped += 1;
                    continue;
                }
                let outcome = portfolio.open_position(OpenOrder {
                    entry_date: timestamp,
                    asset: asset.clone(),
                    side: *side,
                    volume,
                    entry_price: *price,
                    relative_strength: *relative_strength,
                    stop_loss: *stop_loss,
                    stop_gain: *stop_gain,
                })?;
                if outcome.execution {
                    summary.opened += 1;
                }
                if outcome.gated() {
                    summary.gated += 1;
                }
            }
            Signal::Close { asset, price, .. } => {
                let outcome = portfolio.close_position(timestamp, asset, *price)?;
                if outcome.execution.is_some() {
                    summary.closed += 1;
                }
            }
            Signal::Mark { .. } => {
                portfolio.mark_to_market(timestamp, panel)?;
                summary.marks += 1;
            }
            Signal::RaiseStop {
                asset, stop_loss, ..
            } => {
                portfolio.raise_stop_loss(asset, *stop_loss)?;
                summary.stop_raises += 1;
            }
        }
    }

    info!(
        signals = summary.signals,
        opened = summary.opened,
        gated = summary.gated,
        skipped = summary.skipped,
        closed = summary.closed,
        "replay finished"
    );
    Ok(summary)
}
