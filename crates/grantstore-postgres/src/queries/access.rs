//! Access token table.

use grantstore::{AccessRow, StoreResult};
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_postgres::{PgConnection, PgPool};
use time::OffsetDateTime;
use tracing::instrument;

use crate::error::map_sqlx;

type Row = (
    String,
    String,
    String,
    String,
    String,
    i64,
    String,
    String,
    OffsetDateTime,
    String,
);

#[derive(Debug)]
pub(crate) struct AccessQueries {
    pub select: String,
    pub insert: String,
    pub delete: String,
}

impl AccessQueries {
    pub fn new(table: &str) -> Self {
        Self {
            select: format!(
                "SELECT client, code, prev_access_token, access_token, refresh_token, \
                 expires_in, scope, redirect_uri, created_at, extra \
                 FROM {table} WHERE access_token = $1"
            ),
            insert: format!(
                "INSERT INTO {table} \
                 (client, code, prev_access_token, access_token, refresh_token, \
                 expires_in, scope, redirect_uri, created_at, extra) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
            ),
            delete: format!("DELETE FROM {table} WHERE access_token = $1"),
        }
    }

    /// Inserts a token row inside the save transaction.
    #[instrument(skip_all)]
    pub async fn insert(&self, conn: &mut PgConnection, row: &AccessRow) -> StoreResult<()> {
        query(&self.insert)
            .bind(&row.client_id)
            .bind(&row.code)
            .bind(&row.prev_access_token)
            .bind(&row.access_token)
            .bind(&row.refresh_token)
            .bind(row.expires_in)
            .bind(&row.scope)
            .bind(&row.redirect_uri)
            .bind(row.created_at)
            .bind(&row.extra)
            .execute(conn)
            .await
            .map_err(|e| map_sqlx("save access", e))?;
        Ok(())
    }

    #[instrument(skip_all)]
    pub async fn find(&self, pool: &PgPool, access_token: &str) -> StoreResult<Option<AccessRow>> {
        let row: Option<Row> = query_as(&self.select)
            .bind(access_token)
            .fetch_optional(pool)
            .await
            .map_err(|e| map_sqlx("load access", e))?;

        Ok(row.map(
            |(
                client_id,
                code,
                prev_access_token,
                access_token,
                refresh_token,
                expires_in,
                scope,
                redirect_uri,
                created_at,
                extra,
            )| AccessRow {
                client_id,
                code,
                prev_access_token,
                access_token,
                refresh_token,
                expires_in,
                scope,
                redirect_uri,
                extra,
                created_at,
            },
        ))
    }

    #[instrument(skip_all)]
    pub async fn delete(&self, pool: &PgPool, access_token: &str) -> StoreResult<u64> {
        let result = query(&self.delete)
            .bind(access_token)
            .execute(pool)
            .await
            .map_err(|e| map_sqlx("remove access", e))?;
        Ok(result.rows_affected())
    }
}
