//! Daily consolidated capital curve and the moving-average entry gate.
//!
//! Every patrimony adjustment upserts the row for its calendar day, so a day
//! with ten trades ends up holding the values after the last one. The gate
//! compares the latest capital with the trailing mean of daily balances.

use chrono::NaiveDate;

pub const DEFAULT_SMA_WINDOW: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct DailyCapital {
    pub date: NaiveDate,
    pub balance: f64,
    pub capital: f64,
    pub moving_average: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DailyCapitalCurve {
    window: usize,
    rows: Vec<DailyCapital>,
}

impl DailyCapitalCurve {
    /// A window of zero is treated as one.
    pub fn new(window: usize) -> Self {
        DailyCapitalCurve {
            window: window.max(1),
            rows: Vec::new(),
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn rows(&self) -> &[DailyCapital] {
        &self.rows
    }

    pub fn latest(&self) -> Option<&DailyCapital> {
        self.rows.last()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn upsert(&mut self, date: NaiveDate, balance: f64, capital: f64) {
        // Rows arrive in day order, so the match is almost always the last row.
        let index = match self.rows.iter().rposition(|row| row.date == date) {
            Some(index) => {
                let row = &mut self.rows[index];
                row.balance = balance;
                row.capital = capital;
                index
            }
            None => {
                self.rows.push(DailyCapital {
                    date,
                    balance,
                    capital,
                    moving_average: None,
                });
                self.rows.len() - 1
            }
        };

        self.rows[index].moving_average = self.trailing_mean();
    }

    /// Mean balance over the last `window` rows by row order.
    fn trailing_mean(&self) -> Option<f64> {
        if self.rows.len() < self.window {
            return None;
        }
        let tail = &self.rows[self.rows.len() - self.window..];
        Some(tail.iter().map(|row| row.balance).sum::<f64>() / self.window as f64)
    }

    pub fn passes_gate(&self) -> bool {
        match self.rows.last() {
            None => true,
            Some(row) => match row.moving_average {
                None => true,
                Some(average) => row.capital >= average,
            },
        }
    }
}

impl Default for DailyCapitalCurve {
    fn default() -> Self {
        DailyCapitalCurve::new(DEFAULT_SMA_WINDOW)
    }
}
