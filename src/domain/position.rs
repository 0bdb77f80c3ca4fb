//! Position records and their open/close lifecycle.

use chrono::NaiveDateTime;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// The side of the trade that unwinds this one.
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }

    pub fn parse(value: &str) -> Option<Side> {
        match value.trim().to_uppercase().as_str() {
            "BUY" | "LONG" => Some(Side::Buy),
            "SELL" | "SHORT" => Some(Side::Sell),
            _ => None,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exit fields, filled exactly once when the position closes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionExit {
    pub date: NaiveDateTime,
    pub price: f64,
    pub realized_result: f64,
    pub realized_return: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub asset: String,
    pub side: Side,
    pub volume: u64,
    pub entry_date: NaiveDateTime,
    pub entry_price: f64,
    pub relative_strength: f64,
    pub stop_loss: Option<f64>,
    pub stop_gain: Option<f64>,
    pub exit: Option<PositionExit>,
}

impl Position {
    pub fn is_open(&self) -> bool {
        self.exit.is_none()
    }

    pub fn is_long(&self) -> bool {
        self.side == Side::Buy
    }

    /// Per-unit profit at `price`.
    pub fn profit_per_unit(&self, price: f64) -> f64 {
        match self.side {
            Side::Buy => price - self.entry_price,
            Side::Sell => self.entry_price - price,
        }
    }

    pub fn unrealized_result(&self, price: f64) -> f64 {
        self.profit_per_unit(price) * self.volume as f64
    }

    pub fn market_value(&self, price: f64) -> f64 {
        price * self.volume as f64
    }

    pub fn notional(&self) -> f64 {
        self.entry_price * self.volume as f64
    }

    /// Fills the exit fields and returns them. Result is rounded to cents and
    /// return to four decimals.
    pub fn close(&mut self, date: NaiveDateTime, price: f64) -> PositionExit {
        let profit = self.profit_per_unit(price);
        let exit = PositionExit {
            date,
            price,
            realized_result: round_to(profit * self.volume as f64, 2),
            realized_return: round_to(profit / self.entry_price, 4),
        };
        self.exit = Some(exit);
        exit
    }

    pub fn realized_result(&self) -> Option<f64> {
        self.exit.map(|e| e.realized_result)
    }

    pub fn realized_return(&self) -> Option<f64> {
        self.exit.map(|e| e.realized_return)
    }
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
