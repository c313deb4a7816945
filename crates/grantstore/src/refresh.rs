//! Refresh token index.

use tracing::{debug, instrument};

use crate::access::AccessStore;
use crate::backend::Backend;
use crate::error::{StoreError, StoreResult};
use crate::token_prefix;
use crate::types::AccessData;

/// Lookup and revocation of refresh tokens.
///
/// Entries are written by [`AccessStore::save`] inside its transaction.
pub struct RefreshIndex<'a> {
    backend: &'a dyn Backend,
    access: AccessStore<'a>,
}

impl<'a> RefreshIndex<'a> {
    #[must_use]
    pub fn new(backend: &'a dyn Backend, access: AccessStore<'a>) -> Self {
        Self { backend, access }
    }

    /// Load the access token a refresh token was issued with.
    ///
    /// Expiration is not checked here; the returned [`AccessData`] carries
    /// what the caller needs to decide.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the refresh token is unknown or its access token
    /// is gone, or any error from [`AccessStore::load`].
    #[instrument(skip_all, fields(refresh_token = token_prefix(refresh_token)))]
    pub async fn load(&self, refresh_token: &str) -> StoreResult<AccessData> {
        let access_token = self
            .backend
            .find_refresh(refresh_token)
            .await?
            .ok_or_else(|| StoreError::not_found("refresh", refresh_token))?;
        self.access.load(&access_token).await
    }

    /// Revoke a refresh token. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns a backend error if the delete fails.
    #[instrument(skip_all, fields(refresh_token = token_prefix(refresh_token)))]
    pub async fn remove(&self, refresh_token: &str) -> StoreResult<()> {
        let rows = self.backend.delete_refresh(refresh_token).await?;
        debug!(rows, "Removed refresh token");
        Ok(())
    }
}
