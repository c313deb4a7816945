//! Persistent storage for OAuth2 grants.
//!
//! Stores registered clients, authorization codes, access tokens, the refresh
//! token index and an expiry index, and exposes them through the
//! [`OAuthStorage`] contract used by an OAuth2 protocol engine.
//!
//! - [`GrantStore`] - the facade implementing [`OAuthStorage`]
//! - [`Backend`] - table-level operations a storage engine provides
//! - [`InMemoryBackend`] - in-process backend
//!
//! The PostgreSQL backend lives in the `grantstore-postgres` crate.
//!
//! # Consistency
//!
//! Saving an access token is the only multi-table write done in a
//! transaction (refresh index entry, token row, expiry entry). Saving or
//! removing an authorization code, and removing an access token, touch the
//! record table and the expiry index with two separate statements.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use grantstore::{AccessData, GrantStore, InMemoryBackend, Linked, OAuthStorage};
//! use time::{Duration, OffsetDateTime};
//!
//! # tokio_test::block_on(async {
//! let store = GrantStore::new(Arc::new(InMemoryBackend::new()));
//! let client = store.client_with_information("app", "secret", "https://app/cb", "");
//! store.create_client(&client).await?;
//!
//! store
//!     .save_access(&AccessData {
//!         client: Some(client),
//!         authorize_data: Linked::Absent,
//!         access_data: Linked::Absent,
//!         access_token: "a1".into(),
//!         refresh_token: Some("r1".into()),
//!         expires_in: Duration::hours(1),
//!         scope: "read".into(),
//!         redirect_uri: "https://app/cb".into(),
//!         user_data: String::new(),
//!         created_at: OffsetDateTime::now_utc(),
//!     })
//!     .await?;
//!
//! let by_refresh = store.load_refresh("r1").await?;
//! assert_eq!(by_refresh.access_token, "a1");
//! # Ok::<(), grantstore::StoreError>(())
//! # }).unwrap();
//! ```

pub mod access;
pub mod authorize;
pub mod backend;
pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod expiry;
pub mod memory;
pub mod refresh;
pub mod storage;
pub mod types;

#[cfg(test)]
mod fault;

pub use access::AccessStore;
pub use authorize::AuthorizeStore;
pub use backend::{AccessRow, AuthorizeRow, Backend, BackendTransaction};
pub use client::ClientRegistry;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{DEFAULT_MAX_CHAIN_DEPTH, StoreOptions};
pub use error::{BackendErrorKind, StoreError, StoreResult};
pub use expiry::ExpiryIndex;
pub use memory::InMemoryBackend;
pub use refresh::RefreshIndex;
pub use storage::{GrantStore, OAuthStorage};
pub use types::{AccessData, AuthorizeData, Client, ExpiryEntry, LinkError, Linked};

/// Leading characters of a code or token, for log fields.
pub(crate) fn token_prefix(token: &str) -> &str {
    match token.char_indices().nth(8) {
        Some((end, _)) => &token[..end],
        None => token,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_prefix() {
        assert_eq!(token_prefix("abc"), "abc");
        assert_eq!(token_prefix("0123456789abcdef"), "01234567");
        assert_eq!(token_prefix("ééééééééé"), "éééééééé");
    }
}
