use crate::types::Period;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Insufficient history: need at least {needed} periods, got {got}")]
    InsufficientHistory { needed: usize, got: usize },

    #[error("Invalid target period: {target} must come after current period {current}")]
    InvalidTargetPeriod { current: Period, target: Period },

    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type ForecastResult<T> = Result<T, ForecastError>;
