//! OAuth client registry.

use tracing::{debug, instrument};

use crate::backend::Backend;
use crate::error::{StoreError, StoreResult};
use crate::types::Client;

/// CRUD over registered clients.
pub struct ClientRegistry<'a> {
    backend: &'a dyn Backend,
}

impl<'a> ClientRegistry<'a> {
    /// Create a registry over a backend reference.
    #[must_use]
    pub fn new(backend: &'a dyn Backend) -> Self {
        Self { backend }
    }

    /// Load a client by id.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no client has this id, or a backend error.
    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> StoreResult<Client> {
        self.backend
            .find_client(id)
            .await?
            .ok_or_else(|| StoreError::not_found("client", id))
    }

    /// Register a new client.
    ///
    /// # Errors
    ///
    /// Returns a backend unique violation if the id is taken.
    #[instrument(skip_all, fields(client_id = %client.id))]
    pub async fn create(&self, client: &Client) -> StoreResult<()> {
        self.backend.insert_client(client).await?;
        debug!("Created client");
        Ok(())
    }

    /// Replace secret, redirect URI and user data of the client with the same id.
    ///
    /// Updating an unknown id succeeds without effect.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend update fails.
    #[instrument(skip_all, fields(client_id = %client.id))]
    pub async fn update(&self, client: &Client) -> StoreResult<()> {
        let rows = self.backend.update_client(client).await?;
        debug!(rows, "Updated client");
        Ok(())
    }

    /// Remove a client. Removing an unknown id succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend delete fails.
    #[instrument(skip(self))]
    pub async fn remove(&self, id: &str) -> StoreResult<()> {
        let rows = self.backend.delete_client(id).await?;
        debug!(rows, "Removed client");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryBackend;

    #[tokio::test]
    async fn test_create_then_get() {
        let backend = InMemoryBackend::new();
        let clients = ClientRegistry::new(&backend);
        let client = Client::new("c1", "s1", "http://x/cb").with_user_data(r#"{"a":1}"#);

        clients.create(&client).await.unwrap();
        assert_eq!(clients.get("c1").await.unwrap(), client);
    }

    #[tokio::test]
    async fn test_get_missing_is_not_found() {
        let backend = InMemoryBackend::new();
        let err = ClientRegistry::new(&backend).get("nope").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_create_duplicate_is_backend_error() {
        let backend = InMemoryBackend::new();
        let clients = ClientRegistry::new(&backend);
        let client = Client::new("c1", "s1", "http://x/cb");
        clients.create(&client).await.unwrap();

        let err = clients.create(&client).await.unwrap_err();
        assert!(err.is_backend());
        assert!(!err.is_not_found());
    }

    #[tokio::test]
    async fn test_update_and_remove_missing_are_noops() {
        let backend = InMemoryBackend::new();
        let clients = ClientRegistry::new(&backend);
        clients
            .update(&Client::new("ghost", "s", "http://x/cb"))
            .await
            .unwrap();
        clients.remove("ghost").await.unwrap();
        assert!(clients.get("ghost").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_update_replaces_fields() {
        let backend = InMemoryBackend::new();
        let clients = ClientRegistry::new(&backend);
        clients
            .create(&Client::new("c1", "s1", "http://x/cb"))
            .await
            .unwrap();

        let updated = Client::new("c1", "s2", "http://y/cb").with_user_data("meta");
        clients.update(&updated).await.unwrap();
        assert_eq!(clients.get("c1").await.unwrap(), updated);

        clients.remove("c1").await.unwrap();
        assert!(clients.get("c1").await.unwrap_err().is_not_found());
    }
}
