//! Access token storage and rotation chains.
//!
//! Saving an access token writes its refresh index entry, the token row and
//! its expiry entry in a single backend transaction. Loading resolves the
//! owning client strictly and the optional links (originating authorization,
//! rotated-out predecessors) on a best-effort basis.

use std::collections::HashSet;

use tracing::{debug, instrument, warn};

use crate::authorize::AuthorizeStore;
use crate::backend::{AccessRow, Backend, BackendTransaction};
use crate::client::ClientRegistry;
use crate::clock::Clock;
use crate::config::StoreOptions;
use crate::error::{StoreError, StoreResult};
use crate::expiry::ExpiryIndex;
use crate::token_prefix;
use crate::types::{AccessData, LinkError, Linked};

/// Save, load and remove access tokens.
#[derive(Clone, Copy)]
pub struct AccessStore<'a> {
    backend: &'a dyn Backend,
    clock: &'a dyn Clock,
    options: &'a StoreOptions,
}

impl<'a> AccessStore<'a> {
    #[must_use]
    pub fn new(backend: &'a dyn Backend, clock: &'a dyn Clock, options: &'a StoreOptions) -> Self {
        Self {
            backend,
            clock,
            options,
        }
    }

    /// Store an access token.
    ///
    /// The refresh index entry (when a refresh token is set), the token row
    /// and the expiry entry are written in one transaction. Any failure rolls
    /// the transaction back before the error is returned.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` when `data.client` is `None` or the lifetime
    /// cannot be stored (see [`AccessRow::from_data`]), a unique
    /// violation when the access or refresh token is already stored, or
    /// another backend error.
    #[instrument(skip_all, fields(access_token = token_prefix(&data.access_token)))]
    pub async fn save(&self, data: &AccessData) -> StoreResult<()> {
        let client = data
            .client
            .as_ref()
            .ok_or_else(|| StoreError::invalid_argument("access data must carry a client"))?;
        let row = AccessRow::from_data(data, &client.id)?;

        let mut tx = self.backend.begin().await?;
        if let Err(err) = write_access(tx.as_mut(), &row).await {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(error = %rollback_err, "Rollback after failed access save failed");
            }
            return Err(err);
        }
        tx.commit().await?;

        debug!(
            client_id = %row.client_id,
            has_refresh = !row.refresh_token.is_empty(),
            rotated = !row.prev_access_token.is_empty(),
            "Saved access token"
        );
        Ok(())
    }

    /// Load an access token with its client and resolvable history.
    ///
    /// The originating authorization and the chain of previous tokens are
    /// resolved when possible. A link that cannot be loaded, a chain longer
    /// than `max_chain_depth`, or a chain that loops back on itself is
    /// reported as [`Linked::Unresolved`] and does not fail the load.
    ///
    /// Expiration of the token itself is not checked here; see
    /// [`AccessData::is_expired_at`].
    ///
    /// # Errors
    ///
    /// Returns `NotFound` for an unknown token, the client lookup error if the
    /// owning client cannot be loaded, or a backend error.
    #[instrument(skip_all, fields(access_token = token_prefix(access_token)))]
    pub async fn load(&self, access_token: &str) -> StoreResult<AccessData> {
        let (mut head, mut prev_token) = self.load_link(access_token).await?;

        let max_depth = self.options.max_chain_depth;
        let mut visited = HashSet::from([head.access_token.clone()]);
        let mut chain: Vec<AccessData> = Vec::new();
        let mut tail = Linked::Absent;

        while !prev_token.is_empty() {
            if chain.len() >= max_depth {
                tail = Linked::Unresolved(LinkError::DepthExceeded(max_depth));
                break;
            }
            if !visited.insert(prev_token.clone()) {
                warn!(token = token_prefix(&prev_token), "Rotation chain loops back");
                tail = Linked::Unresolved(LinkError::Cycle);
                break;
            }
            match self.load_link(&prev_token).await {
                Ok((link, next)) => {
                    chain.push(link);
                    prev_token = next;
                }
                Err(err) => {
                    debug!(
                        token = token_prefix(&prev_token),
                        error = %err,
                        "Previous access token unavailable"
                    );
                    tail = Linked::Unresolved(err.into());
                    break;
                }
            }
        }

        for mut link in chain.into_iter().rev() {
            link.access_data = tail;
            tail = Linked::resolved(link);
        }
        head.access_data = tail;
        Ok(head)
    }

    /// Delete an access token and its expiry entries.
    ///
    /// The refresh index entry pointing at this token is kept; revoke it with
    /// [`crate::refresh::RefreshIndex::remove`].
    ///
    /// # Errors
    ///
    /// Returns a backend error if either delete fails.
    #[instrument(skip_all, fields(access_token = token_prefix(access_token)))]
    pub async fn remove(&self, access_token: &str) -> StoreResult<()> {
        let rows = self.backend.delete_access(access_token).await?;
        ExpiryIndex::new(self.backend).remove(access_token).await?;
        debug!(rows, "Removed access token");
        Ok(())
    }

    /// Load one token without its predecessor, returning the predecessor's
    /// token value (empty when there is none).
    async fn load_link(&self, access_token: &str) -> StoreResult<(AccessData, String)> {
        let row = self
            .backend
            .find_access(access_token)
            .await?
            .ok_or_else(|| StoreError::not_found("access", access_token))?;

        let client = ClientRegistry::new(self.backend).get(&row.client_id).await?;

        let authorize_data = if row.code.is_empty() {
            Linked::Absent
        } else {
            match AuthorizeStore::new(self.backend, self.clock)
                .load(&row.code)
                .await
            {
                Ok(authorize) => Linked::resolved(authorize),
                Err(err) => {
                    debug!(error = %err, "Originating authorization unavailable");
                    Linked::Unresolved(err.into())
                }
            }
        };

        let prev_token = row.prev_access_token.clone();
        let mut data = row.into_data(client);
        data.authorize_data = authorize_data;
        Ok((data, prev_token))
    }
}

async fn write_access(tx: &mut dyn BackendTransaction, row: &AccessRow) -> StoreResult<()> {
    if !row.refresh_token.is_empty() {
        tx.insert_refresh(&row.refresh_token, &row.access_token)
            .await?;
    }
    tx.insert_access(row).await?;
    tx.insert_expiry(&row.access_token, row.expire_at()?).await
}
