//! File-backed user session store.

use std::path::Path;

use async_trait::async_trait;
use taskpilot_auth::storage::SessionStorage;
use taskpilot_auth::types::UserSession;
use taskpilot_auth::AuthResult;

use crate::encryption::EncryptionService;
use crate::file_store::EncryptedSnapshotStore;

/// File name under the storage base path.
pub const SESSIONS_FILE: &str = "oauth_sessions.enc";

/// Session store persisted to `oauth_sessions.enc`.
pub struct FileSessionStore {
    store: EncryptedSnapshotStore<UserSession>,
}

impl FileSessionStore {
    /// Opens the store under `base_path`, dropping sessions that
    /// expired while the host was down.
    #[must_use]
    pub fn open(base_path: &Path, encryption: EncryptionService) -> Self {
        let store = EncryptedSnapshotStore::open(
            base_path.join(SESSIONS_FILE),
            encryption,
            |s: &UserSession| s.id.clone(),
            |s| !s.is_expired(),
        );
        Self { store }
    }
}

#[async_trait]
impl SessionStorage for FileSessionStore {
    async fn create(&self, session: &UserSession) -> AuthResult<()> {
        self.store.insert(session.clone()).await
    }

    async fn find(&self, session_id: &str) -> AuthResult<Option<UserSession>> {
        Ok(self.store.get(session_id).await)
    }

    async fn delete(&self, session_id: &str) -> AuthResult<bool> {
        self.store.remove(session_id).await
    }

    async fn cleanup_expired(&self) -> AuthResult<usize> {
        self.store.retain(|s| !s.is_expired()).await
    }

    async fn shutdown(&self) -> AuthResult<()> {
        self.store.shutdown().await
    }
}
