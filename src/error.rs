use thiserror::Error;

use crate::models::SeriesId;

pub type Result<T> = std::result::Result<T, ProcessingError>;

#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Date parsing error: {0}")]
    DateParse(#[from] chrono::ParseError),

    #[error("Malformed pair '{part}' in line: {reason}")]
    MalformedLine { part: String, reason: String },

    #[error("Required fields missing for series reconstruction: {}", missing.join(", "))]
    MissingFields { missing: Vec<String> },

    #[error("{series} has {values} values but {timestamps} reconstructed timestamps")]
    LengthMismatch {
        series: SeriesId,
        values: usize,
        timestamps: usize,
    },

    #[error("Invalid log interval {start_s}..{end_s}: must satisfy 0 <= start <= end <= 86400")]
    Range { start_s: i64, end_s: i64 },

    #[error("Not enough samples in the regression window ({points} usable)")]
    RegressionInsufficientData { points: usize },

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Parquet write error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] validator::ValidationErrors),

    #[error("Invalid data format: {0}")]
    InvalidFormat(String),
}

impl ProcessingError {
    /// Only store failures abort a request; everything else is recovered
    /// where it happens.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ProcessingError::StoreUnavailable(_) | ProcessingError::Io(_) | ProcessingError::Json(_)
        )
    }
}
