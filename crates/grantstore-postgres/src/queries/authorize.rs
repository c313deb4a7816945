//! Authorization code table.

use grantstore::{AuthorizeRow, StoreResult};
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_postgres::PgPool;
use time::OffsetDateTime;
use tracing::instrument;

use crate::error::map_sqlx;

type Row = (String, String, i64, String, String, String, OffsetDateTime, String);

#[derive(Debug)]
pub(crate) struct AuthorizeQueries {
    pub select: String,
    pub insert: String,
    pub delete: String,
}

impl AuthorizeQueries {
    pub fn new(table: &str) -> Self {
        Self {
            select: format!(
                "SELECT client, code, expires_in, scope, redirect_uri, state, created_at, extra \
                 FROM {table} WHERE code = $1"
            ),
            insert: format!(
                "INSERT INTO {table} \
                 (client, code, expires_in, scope, redirect_uri, state, created_at, extra) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
            ),
            delete: format!("DELETE FROM {table} WHERE code = $1"),
        }
    }

    #[instrument(skip_all)]
    pub async fn insert(&self, pool: &PgPool, row: &AuthorizeRow) -> StoreResult<()> {
        query(&self.insert)
            .bind(&row.client_id)
            .bind(&row.code)
            .bind(row.expires_in)
            .bind(&row.scope)
            .bind(&row.redirect_uri)
            .bind(&row.state)
            .bind(row.created_at)
            .bind(&row.extra)
            .execute(pool)
            .await
            .map_err(|e| map_sqlx("save authorize", e))?;
        Ok(())
    }

    #[instrument(skip_all)]
    pub async fn find(&self, pool: &PgPool, code: &str) -> StoreResult<Option<AuthorizeRow>> {
        let row: Option<Row> = query_as(&self.select)
            .bind(code)
            .fetch_optional(pool)
            .await
            .map_err(|e| map_sqlx("load authorize", e))?;

        Ok(row.map(
            |(client_id, code, expires_in, scope, redirect_uri, state, created_at, extra)| {
                AuthorizeRow {
                    client_id,
                    code,
                    expires_in,
                    scope,
                    redirect_uri,
                    state,
                    extra,
                    created_at,
                }
            },
        ))
    }

    #[instrument(skip_all)]
    pub async fn delete(&self, pool: &PgPool, code: &str) -> StoreResult<u64> {
        let result = query(&self.delete)
            .bind(code)
            .execute(pool)
            .await
            .map_err(|e| map_sqlx("remove authorize", e))?;
        Ok(result.rows_affected())
    }
}
