//! Error types for the PostgreSQL grant backend.

use grantstore::StoreError;
use sqlx_core::error::Error as SqlxError;

/// Errors raised while setting up the backend.
#[derive(Debug, thiserror::Error)]
pub enum PostgresError {
    /// Database connection error.
    #[error("Database connection error: {0}")]
    Connection(#[from] SqlxError),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl PostgresError {
    /// Creates a new configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

impl From<PostgresError> for StoreError {
    fn from(err: PostgresError) -> Self {
        match err {
            PostgresError::Connection(e) => map_sqlx("connect", e),
            PostgresError::Config { message } => StoreError::invalid_argument(message),
        }
    }
}

/// Result type alias for backend setup.
pub type Result<T> = std::result::Result<T, PostgresError>;

/// Wraps a sqlx error with the name of the operation that raised it.
///
/// Unique key violations keep their own kind so callers can tell a duplicate
/// code or token from other failures.
pub(crate) fn map_sqlx(operation: &'static str, err: SqlxError) -> StoreError {
    if let SqlxError::Database(ref db_err) = err
        && db_err.is_unique_violation()
    {
        return StoreError::unique_violation(operation, err);
    }
    StoreError::backend(operation, err)
}

/// Wraps a transaction control failure.
pub(crate) fn map_tx(operation: &'static str, err: SqlxError) -> StoreError {
    StoreError::transaction(operation, err)
}
