//! Patrimony ledger: append-only snapshots of liquidity, balance and capital.
//!
//! - liquidity: cash available for new long entries
//! - balance: capital counting closed positions only
//! - capital: balance plus the last mark-to-market of open positions

use chrono::NaiveDateTime;
use tracing::debug;

use super::capital_curve::DailyCapitalCurve;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PatrimonySnapshot {
    pub timestamp: NaiveDateTime,
    pub liquidity: f64,
    pub balance: f64,
    pub capital: f64,
}

/// Named adjustment applied to the previous snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adjustment {
    Deposit,
    DecLiquidity,
    IncLiquidity,
    IncBalance,
    DecBalance,
    /// Resets capital to `balance + amount`, where `amount` is the unrealized
    /// result of the open positions.
    MarkToMarket,
}

impl Adjustment {
    /// Returns `(liquidity, balance, capital)` after applying `amount`.
    pub fn apply(self, liquidity: f64, balance: f64, capital: f64, amount: f64) -> (f64, f64, f64) {
        match self {
            Adjustment::Deposit => (liquidity + amount, balance + amount, capital + amount),
            Adjustment::DecLiquidity => (liquidity - amount, balance, capital),
            Adjustment::IncLiquidity => (liquidity + amount, balance, capital),
            Adjustment::IncBalance => (liquidity, balance + amount, capital),
            Adjustment::DecBalance => (liquidity, balance - amount, capital),
            Adjustment::MarkToMarket => (liquidity, balance, balance + amount),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Adjustment::Deposit => "DEPOSIT",
            Adjustment::DecLiquidity => "DEC_LIQUIDO",
            Adjustment::IncLiquidity => "INC_LIQUIDO",
            Adjustment::IncBalance => "INC_SALDO",
            Adjustment::DecBalance => "DEC_SALDO",
            Adjustment::MarkToMarket => "INC_CAPITAL",
        }
    }
}

impl std::fmt::Display for Adjustment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PatrimonyLedger {
    snapshots: Vec<PatrimonySnapshot>,
}

impl PatrimonyLedger {
    pub fn new() -> Self {
        PatrimonyLedger::default()
    }

    /// Appends the next snapshot and feeds the daily curve with the result.
    pub fn apply(
        &mut self,
        timestamp: NaiveDateTime,
        adjustment: Adjustment,
        amount: f64,
        curve: &mut DailyCapitalCurve,
    ) -> PatrimonySnapshot {
        let (liquidity, balance, capital) = match self.snapshots.last() {
            Some(last) => (last.liquidity, last.balance, last.capital),
            None => (0.0, 0.0, 0.0),
        };
        let (liquidity, balance, capital) = adjustment.apply(liquidity, balance, capital, amount);

        let snapshot = PatrimonySnapshot {
            timestamp,
            liquidity,
            balance,
            capital,
        };
        self.snapshots.push(snapshot);
        curve.upsert(timestamp.date(), balance, capital);

        debug!(
            %timestamp,
            %adjustment,
            amount,
            liquidity,
            balance,
            capital,
            "patrimony adjusted"
        );
        snapshot
    }

    pub fn snapshots(&self) -> &[PatrimonySnapshot] {
        &self.snapshots
    }

    pub fn first(&self) -> Option<&PatrimonySnapshot> {
        self.snapshots.first()
    }

    pub fn last(&self) -> Option<&PatrimonySnapshot> {
        self.snapshots.last()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn liquidity(&self) -> f64 {
        self.last().map(|s| s.liquidity).unwrap_or(0.0)
    }

    pub fn balance(&self) -> f64 {
        self.last().map(|s| s.balance).unwrap_or(0.0)
    }

    pub fn capital(&self) -> f64 {
        self.last().map(|s| s.capital).unwrap_or(0.0)
    }

    /// Capital recorded by the first snapshot (the opening deposit).
    pub fn initial_capital(&self) -> f64 {
        self.first().map(|s| s.capital).unwrap_or(0.0)
    }

    pub fn has_liquidity(&self, amount: f64) -> bool {
        self.liquidity() >= amount
    }
}
