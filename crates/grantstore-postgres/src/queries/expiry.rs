//! Expiry index table.

use grantstore::{ExpiryEntry, StoreResult};
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_core::query_scalar::query_scalar;
use sqlx_postgres::{PgConnection, PgPool};
use time::OffsetDateTime;
use tracing::instrument;

use crate::error::map_sqlx;

#[derive(Debug)]
pub(crate) struct ExpiryQueries {
    pub insert: String,
    pub delete: String,
    pub expired: String,
    pub count: String,
}

impl ExpiryQueries {
    pub fn new(table: &str) -> Self {
        Self {
            insert: format!("INSERT INTO {table} (code_or_token, expires_at) VALUES ($1, $2)"),
            delete: format!("DELETE FROM {table} WHERE code_or_token = $1"),
            expired: format!(
                "SELECT id, code_or_token, expires_at FROM {table} \
                 WHERE expires_at < $1 ORDER BY expires_at, id LIMIT $2"
            ),
            count: format!("SELECT COUNT(*) FROM {table}"),
        }
    }

    #[instrument(skip(self, pool, code_or_token))]
    pub async fn insert(
        &self,
        pool: &PgPool,
        code_or_token: &str,
        expires_at: OffsetDateTime,
    ) -> StoreResult<()> {
        query(&self.insert)
            .bind(code_or_token)
            .bind(expires_at)
            .execute(pool)
            .await
            .map_err(|e| map_sqlx("add expire", e))?;
        Ok(())
    }

    /// Same as [`Self::insert`], on the access token save transaction.
    #[instrument(skip(self, conn, code_or_token))]
    pub async fn insert_in(
        &self,
        conn: &mut PgConnection,
        code_or_token: &str,
        expires_at: OffsetDateTime,
    ) -> StoreResult<()> {
        query(&self.insert)
            .bind(code_or_token)
            .bind(expires_at)
            .execute(conn)
            .await
            .map_err(|e| map_sqlx("add expire", e))?;
        Ok(())
    }

    #[instrument(skip_all)]
    pub async fn delete(&self, pool: &PgPool, code_or_token: &str) -> StoreResult<u64> {
        let result = query(&self.delete)
            .bind(code_or_token)
            .execute(pool)
            .await
            .map_err(|e| map_sqlx("remove expire", e))?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self, pool))]
    pub async fn expired(
        &self,
        pool: &PgPool,
        at: OffsetDateTime,
        limit: i64,
    ) -> StoreResult<Vec<ExpiryEntry>> {
        let rows: Vec<(i64, String, OffsetDateTime)> = query_as(&self.expired)
            .bind(at)
            .bind(limit)
            .fetch_all(pool)
            .await
            .map_err(|e| map_sqlx("list expired", e))?;

        Ok(rows
            .into_iter()
            .map(|(id, code_or_token, expires_at)| ExpiryEntry {
                id,
                code_or_token,
                expires_at,
            })
            .collect())
    }

    #[instrument(skip_all)]
    pub async fn count(&self, pool: &PgPool) -> StoreResult<i64> {
        query_scalar(&self.count)
            .fetch_one(pool)
            .await
            .map_err(|e| map_sqlx("count expire", e))
    }
}
