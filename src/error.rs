//! Error types for TraitLens.
//!
//! All errors are strongly typed using thiserror. Outcomes that are routine in a
//! large hierarchy (a missing trait, an expression with no quoted tokens, a token
//! that names no attribute) are modelled as values, not errors.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::catalog::{TraitCategory, TraitKind};
use crate::storage::StorageError;

/// Validation errors that occur during input validation.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Invalid time range: start ({start}) must be before end ({end})")]
    InvalidTimeRange {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("Name cannot be empty")]
    EmptyName,

    #[error("Page size must be at least 1 (got {value})")]
    InvalidPageSize {
        value: usize,
    },

    #[error("Unknown trait code '{code}'")]
    UnknownTraitCode {
        code: String,
    },

    #[error("Invalid value '{value}' for environment key {key}")]
    InvalidEnv {
        key: String,
        value: String,
    },

    #[error("Invalid value range [{low}, {high})")]
    InvalidRange {
        low: f64,
        high: f64,
    },

    #[error("Invalid name pattern '{pattern}': {reason}")]
    InvalidNamePattern {
        pattern: String,
        reason: String,
    },
}

/// Top-level error type for TraitLens.
#[derive(Debug, Error)]
pub enum LensError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// A trait kind was attached under a node of the wrong category.
    #[error("Cannot attach {kind} ({expected}) under {parent}")]
    ConfigMismatch {
        kind: TraitKind,
        expected: TraitCategory,
        parent: String,
    },

    /// The hierarchy store failed or timed out. The core never retries.
    #[error("Store unavailable during {operation}: {source}")]
    StoreUnavailable {
        operation: &'static str,
        #[source]
        source: StorageError,
    },

    #[error("Storage error: {0}")]
    Storage(StorageError),

    #[error("Internal error: {message}")]
    Internal {
        message: String,
    },
}

impl LensError {
    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Wraps a store failure, routing outages to `StoreUnavailable`.
    #[must_use]
    pub fn from_store(operation: &'static str, source: StorageError) -> Self {
        if source.is_unavailable() {
            Self::StoreUnavailable { operation, source }
        } else {
            Self::Storage(source)
        }
    }

    #[must_use]
    pub const fn is_config_mismatch(&self) -> bool {
        matches!(self, Self::ConfigMismatch { .. })
    }

    #[must_use]
    pub const fn is_store_unavailable(&self) -> bool {
        matches!(self, Self::StoreUnavailable { .. })
    }

    /// Returns true if the caller may retry. Retry policy belongs to the caller.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.is_store_unavailable()
    }
}

impl From<StorageError> for LensError {
    fn from(source: StorageError) -> Self {
        Self::from_store("store call", source)
    }
}

/// Result type alias for TraitLens operations.
pub type LensResult<T> = Result<T, LensError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_time_range() {
        let now = Utc::now();
        let err = ValidationError::InvalidTimeRange {
            start: now,
            end: now,
        };
        assert!(err.to_string().contains("Invalid time range"));
    }

    #[test]
    fn test_config_mismatch_message() {
        let err = LensError::ConfigMismatch {
            kind: TraitKind::CauseTriggerName,
            expected: TraitCategory::EventTrait,
            parent: "attribute template 'Temperature'".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("TriggerName"));
        assert!(msg.contains("event trait"));
        assert!(err.is_config_mismatch());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_outages_route_to_store_unavailable() {
        let err = LensError::from_store(
            "bulk_get_values",
            StorageError::Unavailable {
                operation: "bulk_get_values".to_string(),
                reason: "connection reset".to_string(),
            },
        );
        assert!(err.is_store_unavailable());
        assert!(err.is_retryable());
        assert!(err.to_string().contains("bulk_get_values"));

        let err: LensError = StorageError::Timeout {
            operation: "find_attributes".to_string(),
            duration_ms: 5000,
        }
        .into();
        assert!(err.is_store_unavailable());
    }

    #[test]
    fn test_other_store_errors_are_not_retryable() {
        let err: LensError = StorageError::TemplateNotFound("Missing".to_string()).into();
        assert!(matches!(err, LensError::Storage(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_internal() {
        let err = LensError::internal("channel closed");
        assert!(err.to_string().contains("channel closed"));
    }
}
