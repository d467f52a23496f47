//! File-backed refresh token store.

use std::path::Path;

use async_trait::async_trait;
use taskpilot_auth::storage::RefreshTokenStorage;
use taskpilot_auth::types::RefreshToken;
use taskpilot_auth::{AuthError, AuthResult};

use crate::encryption::EncryptionService;
use crate::file_store::EncryptedSnapshotStore;

/// File name under the storage base path.
pub const REFRESH_TOKENS_FILE: &str = "oauth_refresh_tokens.enc";

/// Refresh token store persisted to `oauth_refresh_tokens.enc`.
///
/// Records are keyed by token hash. Tokens already expired when the
/// file is loaded never enter the working set.
pub struct FileRefreshTokenStore {
    store: EncryptedSnapshotStore<RefreshToken>,
}

impl FileRefreshTokenStore {
    /// Opens the store under `base_path`.
    #[must_use]
    pub fn open(base_path: &Path, encryption: EncryptionService) -> Self {
        let store = EncryptedSnapshotStore::open(
            base_path.join(REFRESH_TOKENS_FILE),
            encryption,
            |t: &RefreshToken| t.token_hash.clone(),
            |t| !t.is_expired(),
        );
        Self { store }
    }
}

#[async_trait]
impl RefreshTokenStorage for FileRefreshTokenStore {
    async fn create(&self, token: &RefreshToken) -> AuthResult<()> {
        self.store.insert(token.clone()).await
    }

    async fn find_by_hash(&self, token_hash: &str) -> AuthResult<Option<RefreshToken>> {
        Ok(self.store.get(token_hash).await)
    }

    async fn rotate(
        &self,
        old_hash: &str,
        replacement: &RefreshToken,
    ) -> AuthResult<RefreshToken> {
        let old_hash = old_hash.to_string();
        let replacement = replacement.clone();
        // removal and insertion share one critical section; a losing
        // concurrent rotation sees the old hash gone and fails
        self.store
            .try_mutate(move |records| {
                let old = records.remove(&old_hash).ok_or_else(|| {
                    AuthError::invalid_grant("unknown or rotated refresh token")
                })?;
                records.insert(replacement.token_hash.clone(), replacement);
                Ok(old)
            })
            .await
    }

    async fn revoke(&self, token_hash: &str) -> AuthResult<bool> {
        self.store.remove(token_hash).await
    }

    async fn revoke_by_client(&self, client_id: &str) -> AuthResult<usize> {
        let client_id = client_id.to_string();
        self.store.retain(move |t| t.client_id != client_id).await
    }

    async fn cleanup_expired(&self) -> AuthResult<usize> {
        self.store.retain(|t| !t.is_expired()).await
    }

    async fn shutdown(&self) -> AuthResult<()> {
        self.store.shutdown().await
    }
}
