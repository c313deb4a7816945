//! Storage error types.
//!
//! Every operation in this crate returns [`StoreError`]. The protocol engine
//! branches on [`StoreError::is_not_found`] to tell an invalid code or token
//! apart from a failing backend.

use std::fmt;

use time::OffsetDateTime;

/// Classification of a backend failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendErrorKind {
    /// A unique key already holds the value being inserted.
    UniqueViolation,
    /// Beginning, committing or rolling back a transaction failed.
    Transaction,
    /// A stored value could not be converted to or from its domain type.
    Serialization,
    /// Any other failure reported by the backing store.
    Other,
}

impl fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::UniqueViolation => "unique violation",
            Self::Transaction => "transaction",
            Self::Serialization => "serialization",
            Self::Other => "backend",
        };
        f.write_str(s)
    }
}

/// Errors that can occur during grant storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No row matches the unique key.
    #[error("Not found: {entity} '{key}'")]
    NotFound {
        /// Kind of record looked up (`client`, `authorize`, ...).
        entity: &'static str,
        /// The key that was looked up.
        key: String,
    },

    /// The record exists but its lifetime has passed.
    #[error("Expired: '{key}' expired at {expired_at}")]
    Expired {
        /// Code or token that expired.
        key: String,
        /// The computed expiration instant.
        expired_at: OffsetDateTime,
    },

    /// The caller violated a precondition.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the violated precondition.
        message: String,
    },

    /// The backing store reported a failure.
    #[error("{operation} failed ({kind}): {message}")]
    Backend {
        /// Name of the storage operation that failed.
        operation: &'static str,
        /// Coarse classification of the failure.
        kind: BackendErrorKind,
        /// Backend-provided description.
        message: String,
    },
}

impl StoreError {
    // -------------------------------------------------------------------------
    // Constructor Methods
    // -------------------------------------------------------------------------

    /// Create a `NotFound` error.
    #[must_use]
    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            key: key.into(),
        }
    }

    /// Create an `Expired` error.
    #[must_use]
    pub fn expired(key: impl Into<String>, expired_at: OffsetDateTime) -> Self {
        Self::Expired {
            key: key.into(),
            expired_at,
        }
    }

    /// Create an `InvalidArgument` error.
    #[must_use]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Create a `Backend` error of kind [`BackendErrorKind::Other`].
    #[must_use]
    pub fn backend(operation: &'static str, message: impl fmt::Display) -> Self {
        Self::backend_kind(operation, BackendErrorKind::Other, message)
    }

    /// Create a `Backend` error with an explicit kind.
    #[must_use]
    pub fn backend_kind(
        operation: &'static str,
        kind: BackendErrorKind,
        message: impl fmt::Display,
    ) -> Self {
        Self::Backend {
            operation,
            kind,
            message: message.to_string(),
        }
    }

    /// Create a `Backend` error for a duplicate key.
    #[must_use]
    pub fn unique_violation(operation: &'static str, message: impl fmt::Display) -> Self {
        Self::backend_kind(operation, BackendErrorKind::UniqueViolation, message)
    }

    /// Create a `Backend` error for a transaction failure.
    #[must_use]
    pub fn transaction(operation: &'static str, message: impl fmt::Display) -> Self {
        Self::backend_kind(operation, BackendErrorKind::Transaction, message)
    }

    // -------------------------------------------------------------------------
    // Predicate Methods
    // -------------------------------------------------------------------------

    /// Returns `true` if this is a `NotFound` error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if this is an `Expired` error.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::Expired { .. })
    }

    /// Returns `true` if this is an `InvalidArgument` error.
    #[must_use]
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument { .. })
    }

    /// Returns `true` if this is a backend error of any kind.
    #[must_use]
    pub fn is_backend(&self) -> bool {
        matches!(self, Self::Backend { .. })
    }

    /// Returns `true` if the backend rejected a duplicate key.
    #[must_use]
    pub fn is_unique_violation(&self) -> bool {
        matches!(
            self,
            Self::Backend {
                kind: BackendErrorKind::UniqueViolation,
                ..
            }
        )
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::backend_kind("user data", BackendErrorKind::Serialization, err)
    }
}

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found() {
        let err = StoreError::not_found("client", "abc123");
        assert!(err.is_not_found());
        assert!(!err.is_backend());
        assert_eq!(err.to_string(), "Not found: client 'abc123'");
    }

    #[test]
    fn test_unique_violation_is_backend() {
        let err = StoreError::unique_violation("save refresh", "duplicate key");
        assert!(err.is_backend());
        assert!(err.is_unique_violation());
        assert_eq!(
            err.to_string(),
            "save refresh failed (unique violation): duplicate key"
        );
    }

    #[test]
    fn test_plain_backend_is_not_unique_violation() {
        let err = StoreError::backend("get client", "connection reset");
        assert!(err.is_backend());
        assert!(!err.is_unique_violation());
    }

    #[test]
    fn test_serialization_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = StoreError::from(json_err);
        assert!(matches!(
            err,
            StoreError::Backend {
                kind: BackendErrorKind::Serialization,
                ..
            }
        ));
    }
}
