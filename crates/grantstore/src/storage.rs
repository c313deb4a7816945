//! The storage contract consumed by an OAuth2 protocol engine, and the
//! facade implementing it on top of any [`Backend`].

use std::sync::Arc;

use async_trait::async_trait;

use crate::access::AccessStore;
use crate::authorize::AuthorizeStore;
use crate::backend::Backend;
use crate::client::ClientRegistry;
use crate::clock::{Clock, SystemClock};
use crate::config::StoreOptions;
use crate::error::StoreResult;
use crate::expiry::ExpiryIndex;
use crate::refresh::RefreshIndex;
use crate::types::{AccessData, AuthorizeData, Client};

/// Persistence operations an OAuth2 protocol engine needs.
///
/// `NotFound` errors mean "no such record"; every other error should be
/// treated as a server-side failure.
#[async_trait]
pub trait OAuthStorage: Send + Sync {
    // ==================== Clients ====================

    /// Loads a client by id.
    async fn get_client(&self, id: &str) -> StoreResult<Client>;

    /// Registers a new client; fails if the id is taken.
    async fn create_client(&self, client: &Client) -> StoreResult<()>;

    /// Replaces a client's fields; unknown ids are a silent no-op.
    async fn update_client(&self, client: &Client) -> StoreResult<()>;

    /// Removes a client; unknown ids are a silent no-op.
    async fn remove_client(&self, id: &str) -> StoreResult<()>;

    // ==================== Authorization Codes ====================

    /// Stores an authorization code and its expiry entry.
    async fn save_authorize(&self, data: &AuthorizeData) -> StoreResult<()>;

    /// Loads an authorization code with its client. Fails with `Expired`
    /// once the code's lifetime has passed.
    async fn load_authorize(&self, code: &str) -> StoreResult<AuthorizeData>;

    /// Removes an authorization code and its expiry entry. Idempotent.
    async fn remove_authorize(&self, code: &str) -> StoreResult<()>;

    // ==================== Access Tokens ====================

    /// Stores an access token, its refresh index entry and its expiry entry
    /// atomically.
    async fn save_access(&self, data: &AccessData) -> StoreResult<()>;

    /// Loads an access token with its client and best-effort history.
    async fn load_access(&self, access_token: &str) -> StoreResult<AccessData>;

    /// Removes an access token and its expiry entry. The refresh index entry
    /// is kept.
    async fn remove_access(&self, access_token: &str) -> StoreResult<()>;

    // ==================== Refresh Tokens ====================

    /// Loads the access token a refresh token maps to.
    async fn load_refresh(&self, refresh_token: &str) -> StoreResult<AccessData>;

    /// Revokes a refresh token. Idempotent.
    async fn remove_refresh(&self, refresh_token: &str) -> StoreResult<()>;
}

// =============================================================================
// Grant Store
// =============================================================================

/// Token lifecycle facade over a [`Backend`].
///
/// Cheap to clone; clones share the backend and clock.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
///
/// use grantstore::{GrantStore, InMemoryBackend, OAuthStorage};
///
/// # tokio_test::block_on(async {
/// let store = GrantStore::new(Arc::new(InMemoryBackend::new()));
/// let client = store.client_with_information("c1", "s1", "http://x/cb", "");
/// store.create_client(&client).await?;
/// assert_eq!(store.get_client("c1").await?, client);
/// # Ok::<(), grantstore::StoreError>(())
/// # }).unwrap();
/// ```
#[derive(Clone)]
pub struct GrantStore {
    backend: Arc<dyn Backend>,
    clock: Arc<dyn Clock>,
    options: StoreOptions,
}

impl GrantStore {
    /// Create a store using the system clock and default options.
    #[must_use]
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            clock: Arc::new(SystemClock),
            options: StoreOptions::default(),
        }
    }

    /// Replace the clock used for expiration checks.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the store options.
    #[must_use]
    pub fn with_options(mut self, options: StoreOptions) -> Self {
        self.options = options;
        self
    }

    /// Build a client value from raw fields.
    #[must_use]
    pub fn client_with_information(
        &self,
        id: impl Into<String>,
        secret: impl Into<String>,
        redirect_uri: impl Into<String>,
        user_data: impl Into<String>,
    ) -> Client {
        Client::new(id, secret, redirect_uri).with_user_data(user_data)
    }

    #[must_use]
    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    #[must_use]
    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    // -------------------------------------------------------------------------
    // Component Accessors
    // -------------------------------------------------------------------------

    #[must_use]
    pub fn clients(&self) -> ClientRegistry<'_> {
        ClientRegistry::new(self.backend.as_ref())
    }

    #[must_use]
    pub fn authorizations(&self) -> AuthorizeStore<'_> {
        AuthorizeStore::new(self.backend.as_ref(), self.clock.as_ref())
    }

    #[must_use]
    pub fn access_tokens(&self) -> AccessStore<'_> {
        AccessStore::new(self.backend.as_ref(), self.clock.as_ref(), &self.options)
    }

    #[must_use]
    pub fn refresh_tokens(&self) -> RefreshIndex<'_> {
        RefreshIndex::new(self.backend.as_ref(), self.access_tokens())
    }

    #[must_use]
    pub fn expiry(&self) -> ExpiryIndex<'_> {
        ExpiryIndex::new(self.backend.as_ref())
    }
}

impl std::fmt::Debug for GrantStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GrantStore")
            .field("backend", &self.backend.backend_name())
            .field("options", &self.options)
            .finish()
    }
}

#[async_trait]
impl OAuthStorage for GrantStore {
    async fn get_client(&self, id: &str) -> StoreResult<Client> {
        self.clients().get(id).await
    }

    async fn create_client(&self, client: &Client) -> StoreResult<()> {
        self.clients().create(client).await
    }

    async fn update_client(&self, client: &Client) -> StoreResult<()> {
        self.clients().update(client).await
    }

    async fn remove_client(&self, id: &str) -> StoreResult<()> {
        self.clients().remove(id).await
    }

    async fn save_authorize(&self, data: &AuthorizeData) -> StoreResult<()> {
        self.authorizations().save(data).await
    }

    async fn load_authorize(&self, code: &str) -> StoreResult<AuthorizeData> {
        self.authorizations().load(code).await
    }

    async fn remove_authorize(&self, code: &str) -> StoreResult<()> {
        self.authorizations().remove(code).await
    }

    async fn save_access(&self, data: &AccessData) -> StoreResult<()> {
        self.access_tokens().save(data).await
    }

    async fn load_access(&self, access_token: &str) -> StoreResult<AccessData> {
        self.access_tokens().load(access_token).await
    }

    async fn remove_access(&self, access_token: &str) -> StoreResult<()> {
        self.access_tokens().remove(access_token).await
    }

    async fn load_refresh(&self, refresh_token: &str) -> StoreResult<AccessData> {
        self.refresh_tokens().load(refresh_token).await
    }

    async fn remove_refresh(&self, refresh_token: &str) -> StoreResult<()> {
        self.refresh_tokens().remove(refresh_token).await
    }
}
