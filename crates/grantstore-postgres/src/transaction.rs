//! Transaction used when saving an access token.

use std::sync::Arc;

use async_trait::async_trait;
use grantstore::{AccessRow, BackendTransaction, StoreError, StoreResult};
use sqlx_postgres::{PgConnection, PgTransaction};
use time::OffsetDateTime;
use tracing::debug;

use crate::error::map_tx;
use crate::queries::Queries;

/// Wraps an sqlx PostgreSQL transaction.
///
/// Rolls back on drop if not explicitly committed.
pub struct PostgresTransaction {
    /// Taken on commit or rollback.
    tx: Option<PgTransaction<'static>>,
    queries: Arc<Queries>,
}

impl PostgresTransaction {
    pub(crate) fn new(tx: PgTransaction<'static>, queries: Arc<Queries>) -> Self {
        Self {
            tx: Some(tx),
            queries,
        }
    }

    fn split(&mut self) -> StoreResult<(&mut PgConnection, &Queries)> {
        let tx = self.tx.as_mut().ok_or_else(|| {
            StoreError::transaction("save access", "transaction already completed")
        })?;
        Ok((&mut **tx, &self.queries))
    }
}

#[async_trait]
impl BackendTransaction for PostgresTransaction {
    async fn insert_refresh(&mut self, refresh_token: &str, access_token: &str) -> StoreResult<()> {
        let (conn, queries) = self.split()?;
        queries.refresh.insert(conn, refresh_token, access_token).await
    }

    async fn insert_access(&mut self, row: &AccessRow) -> StoreResult<()> {
        let (conn, queries) = self.split()?;
        queries.access.insert(conn, row).await
    }

    async fn insert_expiry(
        &mut self,
        code_or_token: &str,
        expires_at: OffsetDateTime,
    ) -> StoreResult<()> {
        let (conn, queries) = self.split()?;
        queries.expiry.insert_in(conn, code_or_token, expires_at).await
    }

    async fn commit(mut self: Box<Self>) -> StoreResult<()> {
        if let Some(tx) = self.tx.take() {
            tx.commit().await.map_err(|e| map_tx("commit", e))?;
            debug!("Transaction committed");
        }
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> StoreResult<()> {
        if let Some(tx) = self.tx.take() {
            tx.rollback().await.map_err(|e| map_tx("rollback", e))?;
            debug!("Transaction rolled back");
        }
        Ok(())
    }
}
