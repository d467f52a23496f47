//! File-backed client registration store.

use std::path::Path;

use async_trait::async_trait;
use taskpilot_auth::storage::ClientStorage;
use taskpilot_auth::types::Client;
use taskpilot_auth::{AuthError, AuthResult};

use crate::encryption::EncryptionService;
use crate::file_store::EncryptedSnapshotStore;

/// File name under the storage base path.
pub const CLIENTS_FILE: &str = "oauth_clients.enc";

/// Client store persisted to `oauth_clients.enc`.
pub struct FileClientStore {
    store: EncryptedSnapshotStore<Client>,
}

impl FileClientStore {
    /// Opens the store under `base_path`.
    ///
    /// Client registrations do not expire, so everything readable is
    /// kept.
    #[must_use]
    pub fn open(base_path: &Path, encryption: EncryptionService) -> Self {
        let store = EncryptedSnapshotStore::open(
            base_path.join(CLIENTS_FILE),
            encryption,
            |c: &Client| c.client_id.clone(),
            |_| true,
        );
        Self { store }
    }
}

#[async_trait]
impl ClientStorage for FileClientStore {
    async fn create(&self, client: &Client) -> AuthResult<()> {
        let client = client.clone();
        self.store.insert(client).await.map_err(|e| match e {
            AuthError::Storage { message } if message.contains("duplicate") => {
                AuthError::invalid_request("client_id already registered")
            }
            other => other,
        })
    }

    async fn find_by_client_id(&self, client_id: &str) -> AuthResult<Option<Client>> {
        Ok(self.store.get(client_id).await)
    }

    async fn delete(&self, client_id: &str) -> AuthResult<bool> {
        self.store.remove(client_id).await
    }

    async fn list(&self) -> AuthResult<Vec<Client>> {
        Ok(self
            .store
            .read(|records| records.values().cloned().collect())
            .await)
    }

    async fn shutdown(&self) -> AuthResult<()> {
        self.store.shutdown().await
    }
}
