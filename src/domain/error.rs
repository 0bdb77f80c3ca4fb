//! Domain error types.

use chrono::NaiveDate;

/// Top-level error type for tradebook.
#[derive(Debug, thiserror::Error)]
pub enum TradebookError {
    #[error("position already open for {asset}")]
    DuplicatePosition { asset: String },

    #[error("no open position for {asset}")]
    PositionNotFound { asset: String },

    #[error("invalid frequency: {value}")]
    InvalidFrequency { value: String },

    #[error("no close price for {asset} on {date}")]
    MissingPrice { asset: String, date: NaiveDate },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("data error: {reason}")]
    Data { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl TradebookError {
    /// Process exit status for this error category.
    pub fn exit_status(&self) -> u8 {
        match self {
            TradebookError::Io(_) => 1,
            TradebookError::ConfigParse { .. }
            | TradebookError::ConfigMissing { .. }
            | TradebookError::ConfigInvalid { .. } => 2,
            TradebookError::Data { .. } | TradebookError::MissingPrice { .. } => 3,
            TradebookError::DuplicatePosition { .. } | TradebookError::PositionNotFound { .. } => 4,
            TradebookError::InvalidFrequency { .. } => 5,
        }
    }
}

impl From<&TradebookError> for std::process::ExitCode {
    fn from(err: &TradebookError) -> Self {
        std::process::ExitCode::from(err.exit_status())
    }
}
