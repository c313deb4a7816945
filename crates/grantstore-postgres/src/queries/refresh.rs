//! Refresh token index table.

use grantstore::StoreResult;
use sqlx_core::query::query;
use sqlx_core::query_scalar::query_scalar;
use sqlx_postgres::{PgConnection, PgPool};
use tracing::instrument;

use crate::error::map_sqlx;

#[derive(Debug)]
pub(crate) struct RefreshQueries {
    pub select: String,
    pub insert: String,
    pub delete: String,
}

impl RefreshQueries {
    pub fn new(table: &str) -> Self {
        Self {
            select: format!("SELECT access_token FROM {table} WHERE refresh_token = $1"),
            insert: format!("INSERT INTO {table} (refresh_token, access_token) VALUES ($1, $2)"),
            delete: format!("DELETE FROM {table} WHERE refresh_token = $1"),
        }
    }

    /// Inserts a mapping inside the save transaction.
    #[instrument(skip_all)]
    pub async fn insert(
        &self,
        conn: &mut PgConnection,
        refresh_token: &str,
        access_token: &str,
    ) -> StoreResult<()> {
        query(&self.insert)
            .bind(refresh_token)
            .bind(access_token)
            .execute(conn)
            .await
            .map_err(|e| map_sqlx("save refresh", e))?;
        Ok(())
    }

    #[instrument(skip_all)]
    pub async fn find(&self, pool: &PgPool, refresh_token: &str) -> StoreResult<Option<String>> {
        query_scalar(&self.select)
            .bind(refresh_token)
            .fetch_optional(pool)
            .await
            .map_err(|e| map_sqlx("load refresh", e))
    }

    #[instrument(skip_all)]
    pub async fn delete(&self, pool: &PgPool, refresh_token: &str) -> StoreResult<u64> {
        let result = query(&self.delete)
            .bind(refresh_token)
            .execute(pool)
            .await
            .map_err(|e| map_sqlx("remove refresh", e))?;
        Ok(result.rows_affected())
    }
}
