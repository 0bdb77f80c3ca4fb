//! Operation log: one record per position entry (IN) and exit (OUT).

use chrono::NaiveDateTime;

use super::position::Side;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::In => "IN",
            Direction::Out => "OUT",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OperationRecord {
    pub timestamp: NaiveDateTime,
    pub asset: String,
    pub side: Side,
    pub direction: Direction,
    pub volume: u64,
    pub price: f64,
    pub cost: f64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct OperationLog {
    records: Vec<OperationRecord>,
}

impl OperationLog {
    pub fn new() -> Self {
        OperationLog::default()
    }

    pub(crate) fn append(&mut self, record: OperationRecord) {
        self.records.push(record);
    }

    pub fn records(&self) -> &[OperationRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn total_cost(&self) -> f64 {
        self.records.iter().map(|r| r.cost).sum()
    }
}
