//! Error types for the ping risk engine.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Main error type for the library
#[derive(Error, Debug)]
pub enum Error {
    /// A raw sample field is malformed or out of range
    #[error("Validation error: field `{field}` {reason}")]
    Validation {
        /// Name of the offending raw field
        field: &'static str,
        /// What was wrong with it
        reason: String,
    },

    /// Sample timestamp is not strictly after the newest accepted one
    #[error("Out-of-order sample for `{identity}`: {timestamp} is not after {newest}")]
    OutOfOrder {
        /// Identity the sample was addressed to
        identity: String,
        /// Timestamp carried by the rejected sample
        timestamp: DateTime<Utc>,
        /// Newest timestamp currently in the window
        newest: DateTime<Utc>,
    },

    /// No sample has ever been accepted for this identity
    #[error("Unknown identity: {0}")]
    NotFound(String),

    /// Per-identity state broke an internal invariant and was discarded
    #[error("Invariant violated for `{identity}`: {detail}")]
    InvariantViolation {
        /// Identity whose state was retired
        identity: String,
        /// Description of the broken invariant
        detail: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// File I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Input could not be decoded
    #[error("Parse error: {0}")]
    Parse(String),
}

impl Error {
    /// Shorthand for a [`Error::Validation`]
    pub(crate) fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// Whether the failure was caused by the caller's data rather than engine state
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Validation { .. } | Self::OutOfOrder { .. } | Self::Parse(_))
    }
}

/// Convenience type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_message_names_field() {
        let err = Error::validation("latitude", "must be within [-90, 90], got 91");
        assert_eq!(
            err.to_string(),
            "Validation error: field `latitude` must be within [-90, 90], got 91"
        );
        assert!(err.is_client_error());
    }

    #[test]
    fn test_not_found_is_not_client_error() {
        assert!(!Error::NotFound("pepper".to_string()).is_client_error());
    }
}
