//! Error types for parsing core values.

use thiserror::Error;

/// Errors raised when a pair or timeframe string cannot be understood.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("Invalid timeframe: {0}")]
    InvalidTimeframe(String),

    #[error("Invalid pair: {0}")]
    InvalidPair(String),
}
