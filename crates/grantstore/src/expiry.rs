//! Expiry index.
//!
//! A secondary time index over outstanding codes and tokens. It is not tied to
//! the record tables by any constraint; the record stores add and remove
//! entries alongside their own writes.

use time::OffsetDateTime;
use tracing::{debug, instrument};

use crate::backend::Backend;
use crate::error::StoreResult;
use crate::token_prefix;
use crate::types::ExpiryEntry;

/// Operations on the expiry index.
pub struct ExpiryIndex<'a> {
    backend: &'a dyn Backend,
}

impl<'a> ExpiryIndex<'a> {
    #[must_use]
    pub fn new(backend: &'a dyn Backend) -> Self {
        Self { backend }
    }

    /// Register `code_or_token` as expiring at `expires_at`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend insert fails.
    #[instrument(skip_all, fields(key = token_prefix(code_or_token), expires_at = %expires_at))]
    pub async fn add(&self, code_or_token: &str, expires_at: OffsetDateTime) -> StoreResult<()> {
        self.backend.insert_expiry(code_or_token, expires_at).await?;
        debug!("Registered expiry");
        Ok(())
    }

    /// Drop every entry for `code_or_token`. Missing entries are not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend delete fails.
    #[instrument(skip_all, fields(key = token_prefix(code_or_token)))]
    pub async fn remove(&self, code_or_token: &str) -> StoreResult<()> {
        let rows = self.backend.delete_expiry(code_or_token).await?;
        debug!(rows, "Removed expiry");
        Ok(())
    }

    /// Entries that expired strictly before `at`, oldest first, at most `limit`.
    ///
    /// Listing does not delete anything; callers remove the owning records
    /// through the facade.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend query fails.
    #[instrument(skip(self))]
    pub async fn expired(&self, at: OffsetDateTime, limit: i64) -> StoreResult<Vec<ExpiryEntry>> {
        self.backend.find_expired(at, limit).await
    }

    /// Number of entries in the index.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend query fails.
    pub async fn count(&self) -> StoreResult<i64> {
        self.backend.count_expiry().await
    }
}
