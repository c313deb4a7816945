//! Authorization code storage.
//!
//! Each save writes the code row and then its expiry index entry as two
//! independent statements. A failure on the second is returned to the caller
//! with the code row left in place; concurrent readers can observe a code
//! without its expiry entry in between.

use tracing::{debug, instrument};

use crate::backend::{AuthorizeRow, Backend};
use crate::client::ClientRegistry;
use crate::clock::Clock;
use crate::error::{StoreError, StoreResult};
use crate::expiry::ExpiryIndex;
use crate::token_prefix;
use crate::types::AuthorizeData;

/// Save, load and remove authorization codes.
pub struct AuthorizeStore<'a> {
    backend: &'a dyn Backend,
    clock: &'a dyn Clock,
}

impl<'a> AuthorizeStore<'a> {
    #[must_use]
    pub fn new(backend: &'a dyn Backend, clock: &'a dyn Clock) -> Self {
        Self { backend, clock }
    }

    /// Store an authorization code and register its expiration.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for a lifetime that cannot be stored (see
    /// [`AuthorizeRow::from_data`]), or a backend error if either write fails.
    /// If the expiry write fails the code row stays stored.
    #[instrument(skip_all, fields(client_id = %data.client.id, code = token_prefix(&data.code)))]
    pub async fn save(&self, data: &AuthorizeData) -> StoreResult<()> {
        let row = AuthorizeRow::from_data(data)?;
        let expire_at = row.expire_at()?;
        self.backend.insert_authorize(&row).await?;
        ExpiryIndex::new(self.backend)
            .add(&row.code, expire_at)
            .await?;
        debug!(expire_at = %expire_at, "Saved authorization code");
        Ok(())
    }

    /// Load an authorization code together with its client.
    ///
    /// An expired code is reported as `Expired` and left stored until
    /// [`AuthorizeStore::remove`] is called.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown code, the client lookup error if the
    /// owning client cannot be loaded, `Expired` once the lifetime has passed,
    /// a serialization error if the stored lifetime overflows, or a backend
    /// error.
    #[instrument(skip_all, fields(code = token_prefix(code)))]
    pub async fn load(&self, code: &str) -> StoreResult<AuthorizeData> {
        let row = self
            .backend
            .find_authorize(code)
            .await?
            .ok_or_else(|| StoreError::not_found("authorize", code))?;

        let client = ClientRegistry::new(self.backend).get(&row.client_id).await?;

        let expire_at = row.expire_at()?;
        if expire_at < self.clock.now() {
            return Err(StoreError::expired(code, expire_at));
        }

        Ok(row.into_data(client))
    }

    /// Delete an authorization code and its expiry entries. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns a backend error if either delete fails.
    #[instrument(skip_all, fields(code = token_prefix(code)))]
    pub async fn remove(&self, code: &str) -> StoreResult<()> {
        let rows = self.backend.delete_authorize(code).await?;
        ExpiryIndex::new(self.backend).remove(code).await?;
        debug!(rows, "Removed authorization code");
        Ok(())
    }
}
