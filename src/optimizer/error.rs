use crate::record::RecordError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("Histogram bucket count must be in 1..=1048576, got {0}")]
    InvalidBuckets(usize),

    #[error("Invalid histogram range [{min}, {max}]")]
    InvalidRange { min: i32, max: i32 },

    #[error("Value {value} outside histogram range [{min}, {max}]")]
    ValueOutOfRange { value: i32, min: i32, max: i32 },

    #[error("Corrupt histogram: {0}")]
    CorruptHistogram(String),

    #[error("No statistics for field {0}")]
    UnknownField(usize),

    #[error("Record error: {0}")]
    Record(#[from] RecordError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type StatsResult<T> = Result<T, StatsError>;
