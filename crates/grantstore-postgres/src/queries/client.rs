//! Client table.

use grantstore::{Client, StoreResult};
use sqlx_core::query::query;
use sqlx_core::query_as::query_as;
use sqlx_postgres::PgPool;
use tracing::instrument;

use crate::error::map_sqlx;

#[derive(Debug)]
pub(crate) struct ClientQueries {
    pub select: String,
    pub insert: String,
    pub update: String,
    pub delete: String,
}

impl ClientQueries {
    pub fn new(table: &str) -> Self {
        Self {
            select: format!(
                "SELECT id, secret, redirect_uri, extra FROM {table} WHERE id = $1"
            ),
            insert: format!(
                "INSERT INTO {table} (id, secret, redirect_uri, extra) VALUES ($1, $2, $3, $4)"
            ),
            update: format!(
                "UPDATE {table} SET secret = $2, redirect_uri = $3, extra = $4 WHERE id = $1"
            ),
            delete: format!("DELETE FROM {table} WHERE id = $1"),
        }
    }

    #[instrument(skip(self, pool))]
    pub async fn find(&self, pool: &PgPool, id: &str) -> StoreResult<Option<Client>> {
        let row: Option<(String, String, String, String)> = query_as(&self.select)
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(|e| map_sqlx("get client", e))?;

        Ok(row.map(|(id, secret, redirect_uri, extra)| Client {
            id,
            secret,
            redirect_uri,
            user_data: extra,
        }))
    }

    #[instrument(skip_all, fields(id = %client.id))]
    pub async fn insert(&self, pool: &PgPool, client: &Client) -> StoreResult<()> {
        query(&self.insert)
            .bind(&client.id)
            .bind(&client.secret)
            .bind(&client.redirect_uri)
            .bind(&client.user_data)
            .execute(pool)
            .await
            .map_err(|e| map_sqlx("create client", e))?;
        Ok(())
    }

    #[instrument(skip_all, fields(id = %client.id))]
    pub async fn update(&self, pool: &PgPool, client: &Client) -> StoreResult<u64> {
        let result = query(&self.update)
            .bind(&client.id)
            .bind(&client.secret)
            .bind(&client.redirect_uri)
            .bind(&client.user_data)
            .execute(pool)
            .await
            .map_err(|e| map_sqlx("update client", e))?;
        Ok(result.rows_affected())
    }

    #[instrument(skip(self, pool))]
    pub async fn delete(&self, pool: &PgPool, id: &str) -> StoreResult<u64> {
        let result = query(&self.delete)
            .bind(id)
            .execute(pool)
            .await
            .map_err(|e| map_sqlx("remove client", e))?;
        Ok(result.rows_affected())
    }
}
