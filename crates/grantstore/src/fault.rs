//! Backend wrapper that fails expiry writes on request.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use time::OffsetDateTime;

use crate::backend::{AccessRow, AuthorizeRow, Backend, BackendTransaction};
use crate::error::{StoreError, StoreResult};
use crate::memory::InMemoryBackend;
use crate::types::{Client, ExpiryEntry};

/// [`InMemoryBackend`] whose expiry inserts fail while the switch is on,
/// both on the backend and inside transactions.
#[derive(Debug, Clone, Default)]
pub(crate) struct FaultyBackend {
    inner: InMemoryBackend,
    fail_expiry: Arc<AtomicBool>,
}

impl FaultyBackend {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn fail_expiry_writes(&self, fail: bool) {
        self.fail_expiry.store(fail, Ordering::SeqCst);
    }

    fn check_expiry(&self) -> StoreResult<()> {
        check(&self.fail_expiry)
    }
}

fn check(flag: &AtomicBool) -> StoreResult<()> {
    if flag.load(Ordering::SeqCst) {
        return Err(StoreError::backend("add expire", "injected failure"));
    }
    Ok(())
}

#[async_trait]
impl Backend for FaultyBackend {
    async fn find_client(&self, id: &str) -> StoreResult<Option<Client>> {
        self.inner.find_client(id).await
    }

    async fn insert_client(&self, client: &Client) -> StoreResult<()> {
        self.inner.insert_client(client).await
    }

    async fn update_client(&self, client: &Client) -> StoreResult<u64> {
        self.inner.update_client(client).await
    }

    async fn delete_client(&self, id: &str) -> StoreResult<u64> {
        self.inner.delete_client(id).await
    }

    async fn insert_authorize(&self, row: &AuthorizeRow) -> StoreResult<()> {
        self.inner.insert_authorize(row).await
    }

    async fn find_authorize(&self, code: &str) -> StoreResult<Option<AuthorizeRow>> {
        self.inner.find_authorize(code).await
    }

    async fn delete_authorize(&self, code: &str) -> StoreResult<u64> {
        self.inner.delete_authorize(code).await
    }

    async fn find_access(&self, access_token: &str) -> StoreResult<Option<AccessRow>> {
        self.inner.find_access(access_token).await
    }

    async fn delete_access(&self, access_token: &str) -> StoreResult<u64> {
        self.inner.delete_access(access_token).await
    }

    async fn find_refresh(&self, refresh_token: &str) -> StoreResult<Option<String>> {
        self.inner.find_refresh(refresh_token).await
    }

    async fn delete_refresh(&self, refresh_token: &str) -> StoreResult<u64> {
        self.inner.delete_refresh(refresh_token).await
    }

    async fn insert_expiry(
        &self,
        code_or_token: &str,
        expires_at: OffsetDateTime,
    ) -> StoreResult<()> {
        self.check_expiry()?;
        self.inner.insert_expiry(code_or_token, expires_at).await
    }

    async fn delete_expiry(&self, code_or_token: &str) -> StoreResult<u64> {
        self.inner.delete_expiry(code_or_token).await
    }

    async fn find_expired(
        &self,
        at: OffsetDateTime,
        limit: i64,
    ) -> StoreResult<Vec<ExpiryEntry>> {
        self.inner.find_expired(at, limit).await
    }

    async fn count_expiry(&self) -> StoreResult<i64> {
        self.inner.count_expiry().await
    }

    async fn begin(&self) -> StoreResult<Box<dyn BackendTransaction>> {
        Ok(Box::new(FaultyTransaction {
            inner: self.inner.begin().await?,
            fail_expiry: Arc::clone(&self.fail_expiry),
        }))
    }

    fn backend_name(&self) -> &'static str {
        "faulty"
    }
}

struct FaultyTransaction {
    inner: Box<dyn BackendTransaction>,
    fail_expiry: Arc<AtomicBool>,
}

#[async_trait]
impl BackendTransaction for FaultyTransaction {
    async fn insert_refresh(&mut self, refresh_token: &str, access_token: &str) -> StoreResult<()> {
        self.inner.insert_refresh(refresh_token, access_token).await
    }

    async fn insert_access(&mut self, row: &AccessRow) -> StoreResult<()> {
        self.inner.insert_access(row).await
    }

    async fn insert_expiry(
        &mut self,
        code_or_token: &str,
        expires_at: OffsetDateTime,
    ) -> StoreResult<()> {
        check(&self.fail_expiry)?;
        self.inner.insert_expiry(code_or_token, expires_at).await
    }

    async fn commit(self: Box<Self>) -> StoreResult<()> {
        let this = *self;
        this.inner.commit().await
    }

    async fn rollback(self: Box<Self>) -> StoreResult<()> {
        let this = *self;
        this.inner.rollback().await
    }
}
