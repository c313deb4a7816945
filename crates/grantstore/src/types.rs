//! Domain types handed to and returned from the storage contract.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use time::{Duration, OffsetDateTime};

use crate::error::{StoreError, StoreResult};

// =============================================================================
// Client
// =============================================================================

/// A registered OAuth client.
///
/// `user_data` is opaque to the store. Callers that want structured metadata
/// can go through [`Client::with_serialized_user_data`] and
/// [`Client::user_data_as`], which use JSON as the string representation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Client {
    pub id: String,
    pub secret: String,
    pub redirect_uri: String,
    #[serde(default)]
    pub user_data: String,
}

impl Client {
    /// Create a client without user data.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            secret: secret.into(),
            redirect_uri: redirect_uri.into(),
            user_data: String::new(),
        }
    }

    /// Attach an already serialized user data string.
    #[must_use]
    pub fn with_user_data(mut self, user_data: impl Into<String>) -> Self {
        self.user_data = user_data.into();
        self
    }

    /// Serialize `value` to JSON and attach it as user data.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if `value` cannot be encoded.
    pub fn with_serialized_user_data<T: Serialize>(mut self, value: &T) -> StoreResult<Self> {
        self.user_data = serde_json::to_string(value)?;
        Ok(self)
    }

    /// Decode the user data string as JSON into `T`.
    ///
    /// # Errors
    ///
    /// Returns a serialization error if the stored string is not valid JSON
    /// for `T`.
    pub fn user_data_as<T: DeserializeOwned>(&self) -> StoreResult<T> {
        Ok(serde_json::from_str(&self.user_data)?)
    }
}

// =============================================================================
// Authorization Codes
// =============================================================================

/// An authorization code issued to a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizeData {
    pub client: Client,
    pub code: String,
    pub expires_in: Duration,
    pub scope: String,
    pub redirect_uri: String,
    pub state: String,
    pub user_data: String,
    pub created_at: OffsetDateTime,
}

impl AuthorizeData {
    /// Instant after which the code is no longer valid, or `None` when
    /// `created_at + expires_in` is past the representable date range.
    #[must_use]
    pub fn expire_at(&self) -> Option<OffsetDateTime> {
        self.created_at.checked_add(self.expires_in)
    }

    /// Returns `true` if the code has expired as of `now`. A lifetime past
    /// the representable range never expires.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expire_at().is_some_and(|at| now > at)
    }
}

// =============================================================================
// Access Tokens
// =============================================================================

/// An access token and the history it was derived from.
///
/// `authorize_data` and `access_data` are optional links. On save only their
/// code and token values are read; on load they are resolved on a best-effort
/// basis and a failed resolution is reported through [`Linked::Unresolved`]
/// instead of failing the load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessData {
    /// Owning client. Required on save.
    pub client: Option<Client>,
    /// Authorization the token was exchanged for.
    pub authorize_data: Linked<AuthorizeData>,
    /// Token this one rotated out.
    pub access_data: Linked<AccessData>,
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_in: Duration,
    pub scope: String,
    pub redirect_uri: String,
    pub user_data: String,
    pub created_at: OffsetDateTime,
}

impl AccessData {
    /// Instant after which the token is no longer valid, or `None` when
    /// `created_at + expires_in` is past the representable date range.
    #[must_use]
    pub fn expire_at(&self) -> Option<OffsetDateTime> {
        self.created_at.checked_add(self.expires_in)
    }

    /// Returns `true` if the token has expired as of `now`. A lifetime past
    /// the representable range never expires.
    #[must_use]
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expire_at().is_some_and(|at| now > at)
    }

    /// The refresh token, treating an empty string as absent.
    #[must_use]
    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref().filter(|t| !t.is_empty())
    }

    /// Number of resolved predecessors in the rotation chain.
    #[must_use]
    pub fn chain_len(&self) -> usize {
        let mut len = 0;
        let mut cursor = self.access_data.as_ref();
        while let Some(prev) = cursor {
            len += 1;
            cursor = prev.access_data.as_ref();
        }
        len
    }
}

// =============================================================================
// Optional Links
// =============================================================================

/// Outcome of resolving an optional reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Linked<T> {
    /// No reference was recorded.
    Absent,
    /// The referenced record was loaded.
    Resolved(Box<T>),
    /// A reference was recorded but could not be loaded.
    Unresolved(LinkError),
}

impl<T> Default for Linked<T> {
    fn default() -> Self {
        Self::Absent
    }
}

impl<T> Linked<T> {
    /// Wrap a loaded value.
    #[must_use]
    pub fn resolved(value: T) -> Self {
        Self::Resolved(Box::new(value))
    }

    /// The loaded value, if any.
    #[must_use]
    pub fn as_ref(&self) -> Option<&T> {
        match self {
            Self::Resolved(value) => Some(&**value),
            _ => None,
        }
    }

    /// Consume the link and return the loaded value, if any.
    #[must_use]
    pub fn into_option(self) -> Option<T> {
        match self {
            Self::Resolved(value) => Some(*value),
            _ => None,
        }
    }

    /// Why the reference could not be loaded, if it could not.
    #[must_use]
    pub fn error(&self) -> Option<&LinkError> {
        match self {
            Self::Unresolved(err) => Some(err),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }

    #[must_use]
    pub fn is_unresolved(&self) -> bool {
        matches!(self, Self::Unresolved(_))
    }
}

impl<T> From<Option<T>> for Linked<T> {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Absent, Self::resolved)
    }
}

/// Why an optional reference could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LinkError {
    /// The referenced record no longer exists.
    #[error("linked record not found")]
    NotFound,
    /// The referenced authorization code has expired.
    #[error("linked record expired at {0}")]
    Expired(OffsetDateTime),
    /// The backend failed while loading the reference.
    #[error("linked record lookup failed: {0}")]
    Backend(String),
    /// The rotation chain is longer than the configured depth.
    #[error("rotation chain longer than {0} links")]
    DepthExceeded(usize),
    /// The rotation chain points back at a token already visited.
    #[error("rotation chain revisits a token")]
    Cycle,
}

impl From<StoreError> for LinkError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => Self::NotFound,
            StoreError::Expired { expired_at, .. } => Self::Expired(expired_at),
            other => Self::Backend(other.to_string()),
        }
    }
}

// =============================================================================
// Expiry Index
// =============================================================================

/// One row of the expiry index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpiryEntry {
    /// Surrogate key assigned by the backend.
    pub id: i64,
    pub code_or_token: String,
    pub expires_at: OffsetDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use time::macros::datetime;

    fn access(token: &str) -> AccessData {
        AccessData {
            client: None,
            authorize_data: Linked::Absent,
            access_data: Linked::Absent,
            access_token: token.into(),
            refresh_token: None,
            expires_in: Duration::seconds(3600),
            scope: String::new(),
            redirect_uri: String::new(),
            user_data: String::new(),
            created_at: datetime!(2024-01-01 00:00 UTC),
        }
    }

    #[test]
    fn test_client_user_data_roundtrip() {
        let client = Client::new("c1", "s1", "http://x/cb")
            .with_serialized_user_data(&json!({"tenant": "acme", "tier": 2}))
            .unwrap();
        assert_eq!(client.user_data, r#"{"tenant":"acme","tier":2}"#);

        let decoded: serde_json::Value = client.user_data_as().unwrap();
        assert_eq!(decoded["tenant"], "acme");
    }

    #[test]
    fn test_client_user_data_not_json() {
        let client = Client::new("c1", "s1", "http://x/cb").with_user_data("plain text");
        assert!(client.user_data_as::<serde_json::Value>().is_err());
    }

    #[test]
    fn test_expire_at() {
        let mut data = access("a1");
        data.expires_in = Duration::seconds(600);
        assert_eq!(data.expire_at(), Some(datetime!(2024-01-01 00:10 UTC)));
        assert!(!data.is_expired_at(datetime!(2024-01-01 00:10 UTC)));
        assert!(data.is_expired_at(datetime!(2024-01-01 00:10:01 UTC)));
    }

    #[test]
    fn test_expire_at_out_of_range() {
        let mut data = access("a1");
        data.expires_in = Duration::MAX;
        assert_eq!(data.expire_at(), None);
        assert!(!data.is_expired_at(datetime!(9999-12-31 23:59 UTC)));
    }

    #[test]
    fn test_empty_refresh_token_is_absent() {
        let mut data = access("a1");
        data.refresh_token = Some(String::new());
        assert_eq!(data.refresh_token(), None);
        data.refresh_token = Some("r1".into());
        assert_eq!(data.refresh_token(), Some("r1"));
    }

    #[test]
    fn test_chain_len() {
        let mut a = access("a");
        let b = access("b");
        let mut c = access("c");
        c.access_data = Linked::Unresolved(LinkError::NotFound);
        let mut b_with = b;
        b_with.access_data = Linked::resolved(c);
        a.access_data = Linked::resolved(b_with);
        assert_eq!(a.chain_len(), 2);
    }

    #[test]
    fn test_linked_helpers() {
        let absent: Linked<AccessData> = None.into();
        assert!(absent.is_absent());
        assert_eq!(absent.error(), None);
        assert_eq!(absent.into_option(), None);

        let resolved: Linked<AccessData> = Some(access("a1")).into();
        assert!(resolved.is_resolved());
        assert!(!resolved.is_unresolved());
        assert_eq!(resolved.into_option().map(|a| a.access_token), Some("a1".into()));

        let broken: Linked<AccessData> = Linked::Unresolved(LinkError::Cycle);
        assert!(broken.is_unresolved());
        assert_eq!(broken.error(), Some(&LinkError::Cycle));
        assert!(broken.as_ref().is_none());
        assert_eq!(broken.into_option(), None);
    }

    #[test]
    fn test_link_error_from_store_error() {
        assert_eq!(
            LinkError::from(StoreError::not_found("access", "a1")),
            LinkError::NotFound
        );
        let at = datetime!(2024-01-01 00:00 UTC);
        assert_eq!(
            LinkError::from(StoreError::expired("code1", at)),
            LinkError::Expired(at)
        );
        assert!(matches!(
            LinkError::from(StoreError::backend("load access", "boom")),
            LinkError::Backend(_)
        ));
    }
}
