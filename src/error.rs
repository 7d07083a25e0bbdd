//! Error types for the signal engine

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::types::BarValidationError;

/// Errors that halt a single engine call.
///
/// Insufficient history and numeric degeneracies are not errors: they
/// surface as undefined indicator fields or a `SignalType::None` result.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("malformed bar at index {index}: {source}")]
    InvalidBar {
        index: usize,
        #[source]
        source: BarValidationError,
    },

    #[error("bar timestamp {current} is not after previous bar {previous}")]
    NonMonotonicTimestamp {
        previous: DateTime<Utc>,
        current: DateTime<Utc>,
    },

    #[error("duplicate bar timestamp {0}")]
    DuplicateTimestamp(DateTime<Utc>),

    #[error("batch bar at {0} conflicts with buffered history")]
    HistoryMismatch(DateTime<Utc>),

    #[error("empty bar batch")]
    EmptyBatch,
}

impl EngineError {
    /// Build the ordering error for a pair of consecutive timestamps
    pub fn ordering(previous: DateTime<Utc>, current: DateTime<Utc>) -> Self {
        if previous == current {
            EngineError::DuplicateTimestamp(current)
        } else {
            EngineError::NonMonotonicTimestamp { previous, current }
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be greater than zero")]
    ZeroLength { name: &'static str },

    #[error("{name} must be positive, got {value}")]
    NonPositive { name: &'static str, value: f64 },

    #[error("{name} must not be negative, got {value}")]
    Negative { name: &'static str, value: f64 },

    #[error("min_confirmations ({required}) exceeds the {available} confirmations enabled")]
    TooManyConfirmations { required: usize, available: usize },

    #[error("partial_exit_pct must be within (0, 100], got {0}")]
    PartialPct(f64),

    #[error("macd_fast ({fast}) must be shorter than macd_slow ({slow})")]
    MacdOrder { fast: usize, slow: usize },

    #[error("session.max_history ({max_history}) must be at least {min}")]
    HistoryTooShort { max_history: usize, min: usize },

    #[error("unknown timezone: {0}")]
    UnknownTimezone(String),

    #[error("unknown strategy: {0}")]
    UnknownStrategy(String),
}
