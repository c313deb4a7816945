//! PostgreSQL backend for grantstore.
//!
//! Stores grants in five tables sharing a configurable prefix:
//!
//! - `{prefix}_client` - registered clients
//! - `{prefix}_authorize` - authorization codes
//! - `{prefix}_access` - access tokens
//! - `{prefix}_refresh` - refresh token to access token index
//! - `{prefix}_expires` - expiry index
//!
//! The tables must already exist; this crate never issues DDL.
//!
//! `expires_in` is stored as whole seconds (`BIGINT`) and timestamps as
//! `timestamptz`, which keeps microseconds. A `created_at` with a nanosecond
//! part loads back truncated to the microsecond.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use grantstore::{GrantStore, OAuthStorage};
//! use grantstore_postgres::{PostgresBackend, PostgresConfig};
//!
//! let config = PostgresConfig::new("postgres://localhost/auth").with_table_prefix("osin");
//! let backend = PostgresBackend::connect(&config).await?;
//! let store = GrantStore::new(Arc::new(backend));
//! let client = store.get_client("my-app").await?;
//! ```

mod config;
mod error;
mod pool;
mod queries;
mod tables;
mod transaction;

use std::sync::Arc;

use async_trait::async_trait;
use grantstore::{
    AccessRow, AuthorizeRow, Backend, BackendTransaction, Client, ExpiryEntry, StoreResult,
};
use time::OffsetDateTime;
use tracing::info;

pub use config::{ENV_DATABASE_URL, ENV_POOL_SIZE, ENV_TABLE_PREFIX, PostgresConfig};
pub use error::{PostgresError, Result};
pub use pool::{PgPoolOptions, create_pool};
pub use tables::{TableNames, TablePrefix};
pub use transaction::PostgresTransaction;

use crate::error::map_tx;
use crate::queries::Queries;

/// PostgreSQL connection pool type alias.
pub type PgPool = sqlx_postgres::PgPool;

/// Grant backend over a PostgreSQL connection pool.
#[derive(Clone)]
pub struct PostgresBackend {
    pool: Arc<PgPool>,
    tables: TableNames,
    queries: Arc<Queries>,
}

impl PostgresBackend {
    /// Create a backend over an existing pool.
    #[must_use]
    pub fn new(pool: Arc<PgPool>, prefix: &TablePrefix) -> Self {
        let tables = TableNames::new(prefix);
        let queries = Arc::new(Queries::new(&tables));
        Self {
            pool,
            tables,
            queries,
        }
    }

    /// Create a backend by connecting with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns a configuration error for an invalid table prefix, or a
    /// connection error if the pool cannot be created.
    pub async fn connect(config: &PostgresConfig) -> Result<Self> {
        let prefix = config.prefix()?;
        let pool = create_pool(config).await?;
        info!(prefix = %prefix, "PostgreSQL grant backend ready");
        Ok(Self::new(Arc::new(pool), &prefix))
    }

    /// Get a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Names of the tables this backend reads and writes.
    #[must_use]
    pub fn tables(&self) -> &TableNames {
        &self.tables
    }
}

impl std::fmt::Debug for PostgresBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresBackend")
            .field("tables", &self.tables)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Backend for PostgresBackend {
    async fn find_client(&self, id: &str) -> StoreResult<Option<Client>> {
        self.queries.client.find(&self.pool, id).await
    }

    async fn insert_client(&self, client: &Client) -> StoreResult<()> {
        self.queries.client.insert(&self.pool, client).await
    }

    async fn update_client(&self, client: &Client) -> StoreResult<u64> {
        self.queries.client.update(&self.pool, client).await
    }

    async fn delete_client(&self, id: &str) -> StoreResult<u64> {
        self.queries.client.delete(&self.pool, id).await
    }

    async fn insert_authorize(&self, row: &AuthorizeRow) -> StoreResult<()> {
        self.queries.authorize.insert(&self.pool, row).await
    }

    async fn find_authorize(&self, code: &str) -> StoreResult<Option<AuthorizeRow>> {
        self.queries.authorize.find(&self.pool, code).await
    }

    async fn delete_authorize(&self, code: &str) -> StoreResult<u64> {
        self.queries.authorize.delete(&self.pool, code).await
    }

    async fn find_access(&self, access_token: &str) -> StoreResult<Option<AccessRow>> {
        self.queries.access.find(&self.pool, access_token).await
    }

    async fn delete_access(&self, access_token: &str) -> StoreResult<u64> {
        self.queries.access.delete(&self.pool, access_token).await
    }

    async fn find_refresh(&self, refresh_token: &str) -> StoreResult<Option<String>> {
        self.queries.refresh.find(&self.pool, refresh_token).await
    }

    async fn delete_refresh(&self, refresh_token: &str) -> StoreResult<u64> {
        self.queries.refresh.delete(&self.pool, refresh_token).await
    }

    async fn insert_expiry(
        &self,
        code_or_token: &str,
        expires_at: OffsetDateTime,
    ) -> StoreResult<()> {
        self.queries
            .expiry
            .insert(&self.pool, code_or_token, expires_at)
            .await
    }

    async fn delete_expiry(&self, code_or_token: &str) -> StoreResult<u64> {
        self.queries.expiry.delete(&self.pool, code_or_token).await
    }

    async fn find_expired(&self, at: OffsetDateTime, limit: i64) -> StoreResult<Vec<ExpiryEntry>> {
        self.queries.expiry.expired(&self.pool, at, limit).await
    }

    async fn count_expiry(&self) -> StoreResult<i64> {
        self.queries.expiry.count(&self.pool).await
    }

    async fn begin(&self) -> StoreResult<Box<dyn BackendTransaction>> {
        let tx = self.pool.begin().await.map_err(|e| map_tx("begin", e))?;
        Ok(Box::new(PostgresTransaction::new(tx, self.queries.clone())))
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
