use thiserror::Error;

/// Validation and contract errors exposed by `tickerforge-core`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("ticker cannot be empty")]
    EmptyTicker,
    #[error("ticker length {len} exceeds max {max}")]
    TickerTooLong { len: usize, max: usize },
    #[error("ticker contains invalid character '{ch}' at index {index}")]
    TickerInvalidChar { ch: char, index: usize },

    #[error("invalid calendar date '{value}', expected YYYY-MM-DD")]
    InvalidDate { value: String },
    #[error("timestamp must be RFC3339 UTC (suffix Z): '{value}'")]
    TimestampNotUtc { value: String },

    #[error("invalid feed '{value}', expected one of polygon, tiingo, openfigi, yahoo")]
    InvalidFeed { value: String },
    #[error("invalid asset type '{value}'")]
    InvalidAssetType { value: String },
}

/// Top-level error type for core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Safety(#[from] crate::safety::SafetyViolation),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
