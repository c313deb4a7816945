//! In-process grant backend.
//!
//! All five tables live behind one async mutex. A transaction holds the lock
//! from `begin` until commit or rollback, which serializes access token saves
//! the same way row locks on a unique key would. Inserts made inside a
//! transaction are undone on rollback or drop.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::backend::{AccessRow, AuthorizeRow, Backend, BackendTransaction};
use crate::error::{StoreError, StoreResult};
use crate::types::{Client, ExpiryEntry};

#[derive(Debug, Default)]
struct Tables {
    clients: HashMap<String, Client>,
    authorize: HashMap<String, AuthorizeRow>,
    access: HashMap<String, AccessRow>,
    refresh: HashMap<String, String>,
    expires: BTreeMap<i64, ExpiryEntry>,
    next_expiry_id: i64,
}

impl Tables {
    fn push_expiry(&mut self, code_or_token: &str, expires_at: OffsetDateTime) -> i64 {
        self.next_expiry_id += 1;
        let id = self.next_expiry_id;
        self.expires.insert(
            id,
            ExpiryEntry {
                id,
                code_or_token: code_or_token.to_owned(),
                expires_at,
            },
        );
        id
    }

    fn insert_refresh(&mut self, refresh_token: &str, access_token: &str) -> StoreResult<()> {
        if self.refresh.contains_key(refresh_token) {
            return Err(StoreError::unique_violation(
                "save refresh",
                "refresh token already indexed",
            ));
        }
        self.refresh
            .insert(refresh_token.to_owned(), access_token.to_owned());
        Ok(())
    }

    fn insert_access(&mut self, row: &AccessRow) -> StoreResult<()> {
        if self.access.contains_key(&row.access_token) {
            return Err(StoreError::unique_violation(
                "save access",
                "access token already exists",
            ));
        }
        self.access.insert(row.access_token.clone(), row.clone());
        Ok(())
    }
}

/// In-memory [`Backend`] implementation.
#[derive(Debug, Clone, Default)]
pub struct InMemoryBackend {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Backend for InMemoryBackend {
    async fn find_client(&self, id: &str) -> StoreResult<Option<Client>> {
        Ok(self.tables.lock().await.clients.get(id).cloned())
    }

    async fn insert_client(&self, client: &Client) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        if tables.clients.contains_key(&client.id) {
            return Err(StoreError::unique_violation(
                "create client",
                format!("client '{}' already exists", client.id),
            ));
        }
        tables.clients.insert(client.id.clone(), client.clone());
        Ok(())
    }

    async fn update_client(&self, client: &Client) -> StoreResult<u64> {
        let mut tables = self.tables.lock().await;
        match tables.clients.get_mut(&client.id) {
            Some(existing) => {
                *existing = client.clone();
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_client(&self, id: &str) -> StoreResult<u64> {
        let removed = self.tables.lock().await.clients.remove(id);
        Ok(u64::from(removed.is_some()))
    }

    async fn insert_authorize(&self, row: &AuthorizeRow) -> StoreResult<()> {
        let mut tables = self.tables.lock().await;
        if tables.authorize.contains_key(&row.code) {
            return Err(StoreError::unique_violation(
                "save authorize",
                "authorization code already exists",
            ));
        }
        tables.authorize.insert(row.code.clone(), row.clone());
        Ok(())
    }

    async fn find_authorize(&self, code: &str) -> StoreResult<Option<AuthorizeRow>> {
        Ok(self.tables.lock().await.authorize.get(code).cloned())
    }

    async fn delete_authorize(&self, code: &str) -> StoreResult<u64> {
        let removed = self.tables.lock().await.authorize.remove(code);
        Ok(u64::from(removed.is_some()))
    }

    async fn find_access(&self, access_token: &str) -> StoreResult<Option<AccessRow>> {
        Ok(self.tables.lock().await.access.get(access_token).cloned())
    }

    async fn delete_access(&self, access_token: &str) -> StoreResult<u64> {
        let removed = self.tables.lock().await.access.remove(access_token);
        Ok(u64::from(removed.is_some()))
    }

    async fn find_refresh(&self, refresh_token: &str) -> StoreResult<Option<String>> {
        Ok(self.tables.lock().await.refresh.get(refresh_token).cloned())
    }

    async fn delete_refresh(&self, refresh_token: &str) -> StoreResult<u64> {
        let removed = self.tables.lock().await.refresh.remove(refresh_token);
        Ok(u64::from(removed.is_some()))
    }

    async fn insert_expiry(
        &self,
        code_or_token: &str,
        expires_at: OffsetDateTime,
    ) -> StoreResult<()> {
        self.tables
            .lock()
            .await
            .push_expiry(code_or_token, expires_at);
        Ok(())
    }

    async fn delete_expiry(&self, code_or_token: &str) -> StoreResult<u64> {
        let mut tables = self.tables.lock().await;
        let before = tables.expires.len();
        tables
            .expires
            .retain(|_, entry| entry.code_or_token != code_or_token);
        Ok((before - tables.expires.len()) as u64)
    }

    async fn find_expired(
        &self,
        at: OffsetDateTime,
        limit: i64,
    ) -> StoreResult<Vec<ExpiryEntry>> {
        let tables = self.tables.lock().await;
        let mut expired: Vec<ExpiryEntry> = tables
            .expires
            .values()
            .filter(|entry| entry.expires_at < at)
            .cloned()
            .collect();
        expired.sort_by(|a, b| a.expires_at.cmp(&b.expires_at).then(a.id.cmp(&b.id)));
        expired.truncate(usize::try_from(limit.max(0)).unwrap_or(usize::MAX));
        Ok(expired)
    }

    async fn count_expiry(&self) -> StoreResult<i64> {
        Ok(self.tables.lock().await.expires.len() as i64)
    }

    async fn begin(&self) -> StoreResult<Box<dyn BackendTransaction>> {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        Ok(Box::new(InMemoryTransaction {
            tables: Some(guard),
            undo: Vec::new(),
        }))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

// =============================================================================
// Transaction
// =============================================================================

#[derive(Debug)]
enum Undo {
    Refresh(String),
    Access(String),
    Expiry(i64),
}

/// Transaction over [`InMemoryBackend`] holding the table lock.
pub struct InMemoryTransaction {
    tables: Option<OwnedMutexGuard<Tables>>,
    undo: Vec<Undo>,
}

impl InMemoryTransaction {
    fn tables(&mut self) -> StoreResult<&mut Tables> {
        self.tables
            .as_deref_mut()
            .ok_or_else(|| StoreError::transaction("save access", "transaction already completed"))
    }

    fn undo_all(&mut self) {
        let Some(tables) = self.tables.as_deref_mut() else {
            return;
        };
        for step in self.undo.drain(..).rev() {
            match step {
                Undo::Refresh(key) => {
                    tables.refresh.remove(&key);
                }
                Undo::Access(key) => {
                    tables.access.remove(&key);
                }
                Undo::Expiry(id) => {
                    tables.expires.remove(&id);
                }
            }
        }
    }
}

#[async_trait]
impl BackendTransaction for InMemoryTransaction {
    async fn insert_refresh(
        &mut self,
        refresh_token: &str,
        access_token: &str,
    ) -> StoreResult<()> {
        self.tables()?.insert_refresh(refresh_token, access_token)?;
        self.undo.push(Undo::Refresh(refresh_token.to_owned()));
        Ok(())
    }

    async fn insert_access(&mut self, row: &AccessRow) -> StoreResult<()> {
        self.tables()?.insert_access(row)?;
        self.undo.push(Undo::Access(row.access_token.clone()));
        Ok(())
    }

    async fn insert_expiry(
        &mut self,
        code_or_token: &str,
        expires_at: OffsetDateTime,
    ) -> StoreResult<()> {
        let id = self.tables()?.push_expiry(code_or_token, expires_at);
        self.undo.push(Undo::Expiry(id));
        Ok(())
    }

    async fn commit(mut self: Box<Self>) -> StoreResult<()> {
        self.undo.clear();
        self.tables.take();
        Ok(())
    }

    async fn rollback(mut self: Box<Self>) -> StoreResult<()> {
        self.undo_all();
        self.tables.take();
        Ok(())
    }
}

impl Drop for InMemoryTransaction {
    fn drop(&mut self) {
        self.undo_all();
    }
}
