//! Backend traits for the five grant tables.
//!
//! A backend is a transactional key-based store with one table per record
//! kind. It enforces unique keys and nothing else: expiry checks, chain
//! resolution and cross-table bookkeeping live in the component stores.
//!
//! # Implementations
//!
//! - [`crate::memory::InMemoryBackend`] - in-process tables, used in tests
//! - `grantstore-postgres` - PostgreSQL backend

use async_trait::async_trait;
use time::{Duration, OffsetDateTime};

use crate::error::{BackendErrorKind, StoreError, StoreResult};
use crate::types::{AccessData, AuthorizeData, Client, ExpiryEntry, Linked};

// =============================================================================
// Lifetimes
// =============================================================================

/// Validates a lifetime for storage and returns it in whole seconds.
///
/// Lifetimes are stored as whole seconds, so sub-second parts are rejected
/// rather than truncated. `created_at + expires_in` must be representable.
fn stored_lifetime(created_at: OffsetDateTime, expires_in: Duration) -> StoreResult<i64> {
    if expires_in.subsec_nanoseconds() != 0 {
        return Err(StoreError::invalid_argument(format!(
            "expires_in must be a whole number of seconds, got {expires_in}"
        )));
    }
    if created_at.checked_add(expires_in).is_none() {
        return Err(StoreError::invalid_argument(format!(
            "expires_in of {expires_in} from {created_at} is out of range"
        )));
    }
    Ok(expires_in.whole_seconds())
}

/// Expiration instant of a stored row.
fn stored_expire_at(created_at: OffsetDateTime, expires_in: i64) -> StoreResult<OffsetDateTime> {
    created_at
        .checked_add(Duration::seconds(expires_in))
        .ok_or_else(|| {
            StoreError::backend_kind(
                "expire at",
                BackendErrorKind::Serialization,
                format!("stored lifetime of {expires_in}s from {created_at} is out of range"),
            )
        })
}

// =============================================================================
// Rows
// =============================================================================

/// Stored shape of an authorization code.
///
/// `expires_in` holds whole seconds. `created_at` keeps whatever precision the
/// backend stores (microseconds for PostgreSQL `timestamptz`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizeRow {
    pub client_id: String,
    pub code: String,
    /// Lifetime in whole seconds.
    pub expires_in: i64,
    pub scope: String,
    pub redirect_uri: String,
    pub state: String,
    pub extra: String,
    pub created_at: OffsetDateTime,
}

impl AuthorizeRow {
    /// Flatten an authorization for storage.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `expires_in` has a sub-second part or
    /// runs past the representable date range.
    pub fn from_data(data: &AuthorizeData) -> StoreResult<Self> {
        Ok(Self {
            client_id: data.client.id.clone(),
            code: data.code.clone(),
            expires_in: stored_lifetime(data.created_at, data.expires_in)?,
            scope: data.scope.clone(),
            redirect_uri: data.redirect_uri.clone(),
            state: data.state.clone(),
            extra: data.user_data.clone(),
            created_at: data.created_at,
        })
    }

    /// Instant after which the code is no longer valid.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the stored lifetime overflows.
    pub fn expire_at(&self) -> StoreResult<OffsetDateTime> {
        stored_expire_at(self.created_at, self.expires_in)
    }

    /// Rebuild the domain value once the client has been resolved.
    #[must_use]
    pub fn into_data(self, client: Client) -> AuthorizeData {
        AuthorizeData {
            client,
            code: self.code,
            expires_in: Duration::seconds(self.expires_in),
            scope: self.scope,
            redirect_uri: self.redirect_uri,
            state: self.state,
            user_data: self.extra,
            created_at: self.created_at,
        }
    }
}

/// Stored shape of an access token.
///
/// Optional references are stored as empty strings. Precision of
/// `expires_in` and `created_at` is the same as for [`AuthorizeRow`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessRow {
    pub client_id: String,
    pub code: String,
    pub prev_access_token: String,
    pub access_token: String,
    pub refresh_token: String,
    /// Lifetime in whole seconds.
    pub expires_in: i64,
    pub scope: String,
    pub redirect_uri: String,
    pub extra: String,
    pub created_at: OffsetDateTime,
}

impl AccessRow {
    /// Flatten an access token for storage under `client_id`.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `expires_in` has a sub-second part or
    /// runs past the representable date range.
    pub fn from_data(data: &AccessData, client_id: &str) -> StoreResult<Self> {
        Ok(Self {
            client_id: client_id.to_owned(),
            code: data
                .authorize_data
                .as_ref()
                .map(|a| a.code.clone())
                .unwrap_or_default(),
            prev_access_token: data
                .access_data
                .as_ref()
                .map(|prev| prev.access_token.clone())
                .unwrap_or_default(),
            access_token: data.access_token.clone(),
            refresh_token: data.refresh_token().unwrap_or_default().to_owned(),
            expires_in: stored_lifetime(data.created_at, data.expires_in)?,
            scope: data.scope.clone(),
            redirect_uri: data.redirect_uri.clone(),
            extra: data.user_data.clone(),
            created_at: data.created_at,
        })
    }

    /// Instant after which the token is no longer valid.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the stored lifetime overflows.
    pub fn expire_at(&self) -> StoreResult<OffsetDateTime> {
        stored_expire_at(self.created_at, self.expires_in)
    }

    /// Rebuild the domain value with unresolved links left absent.
    #[must_use]
    pub fn into_data(self, client: Client) -> AccessData {
        AccessData {
            client: Some(client),
            authorize_data: Linked::Absent,
            access_data: Linked::Absent,
            refresh_token: Some(self.refresh_token).filter(|t| !t.is_empty()),
            access_token: self.access_token,
            expires_in: Duration::seconds(self.expires_in),
            scope: self.scope,
            redirect_uri: self.redirect_uri,
            user_data: self.extra,
            created_at: self.created_at,
        }
    }
}

// =============================================================================
// Backend Traits
// =============================================================================

/// Table-level operations of a grant backend.
///
/// Lookups return `Ok(None)` for a missing key. Deletes return the number of
/// removed rows and never fail because nothing matched. Inserts that collide
/// with a unique key fail with [`crate::StoreError::unique_violation`].
#[async_trait]
pub trait Backend: Send + Sync {
    // ==================== Clients ====================

    async fn find_client(&self, id: &str) -> StoreResult<Option<Client>>;

    async fn insert_client(&self, client: &Client) -> StoreResult<()>;

    /// Returns the number of updated rows; zero is not an error.
    async fn update_client(&self, client: &Client) -> StoreResult<u64>;

    async fn delete_client(&self, id: &str) -> StoreResult<u64>;

    // ==================== Authorization Codes ====================

    async fn insert_authorize(&self, row: &AuthorizeRow) -> StoreResult<()>;

    async fn find_authorize(&self, code: &str) -> StoreResult<Option<AuthorizeRow>>;

    async fn delete_authorize(&self, code: &str) -> StoreResult<u64>;

    // ==================== Access Tokens ====================

    async fn find_access(&self, access_token: &str) -> StoreResult<Option<AccessRow>>;

    async fn delete_access(&self, access_token: &str) -> StoreResult<u64>;

    // ==================== Refresh Index ====================

    /// Returns the access token a refresh token maps to.
    async fn find_refresh(&self, refresh_token: &str) -> StoreResult<Option<String>>;

    async fn delete_refresh(&self, refresh_token: &str) -> StoreResult<u64>;

    // ==================== Expiry Index ====================

    async fn insert_expiry(&self, code_or_token: &str, expires_at: OffsetDateTime)
    -> StoreResult<()>;

    /// Removes every entry for `code_or_token`.
    async fn delete_expiry(&self, code_or_token: &str) -> StoreResult<u64>;

    /// Entries with `expires_at` strictly before `at`, oldest first.
    async fn find_expired(&self, at: OffsetDateTime, limit: i64)
    -> StoreResult<Vec<ExpiryEntry>>;

    async fn count_expiry(&self) -> StoreResult<i64>;

    // ==================== Transactions ====================

    /// Begins a transaction for the multi-table access token write.
    ///
    /// The transaction rolls back if dropped without [`BackendTransaction::commit`].
    async fn begin(&self) -> StoreResult<Box<dyn BackendTransaction>>;

    // ==================== Metadata ====================

    /// Name of this backend for logging.
    fn backend_name(&self) -> &'static str;
}

/// Writes performed atomically while saving an access token.
#[async_trait]
pub trait BackendTransaction: Send {
    async fn insert_refresh(&mut self, refresh_token: &str, access_token: &str)
    -> StoreResult<()>;

    async fn insert_access(&mut self, row: &AccessRow) -> StoreResult<()>;

    async fn insert_expiry(
        &mut self,
        code_or_token: &str,
        expires_at: OffsetDateTime,
    ) -> StoreResult<()>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;

    async fn rollback(self: Box<Self>) -> StoreResult<()>;
}
