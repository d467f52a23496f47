//! # taskpilot-auth-file
//!
//! Encrypted file storage backend for the Taskpilot authorization
//! server.
//!
//! Each store (clients, refresh tokens, sessions) keeps its working set
//! in memory and persists it as one AES-256-GCM encrypted file under a
//! common base path:
//!
//! - `oauth_clients.enc`
//! - `oauth_refresh_tokens.enc`
//! - `oauth_sessions.enc`
//!
//! Startup tolerates missing and corrupted files (a corrupted file is
//! logged and that store starts empty; siblings are unaffected). Call
//! [`FileAuthStores::shutdown`] before process exit so the final
//! snapshots are durably flushed.
//!
//! ## Example
//!
//! ```ignore
//! use taskpilot_auth_file::{FileAuthStores, KeySource};
//!
//! let stores = FileAuthStores::open(
//!     "/var/lib/taskpilot/auth".as_ref(),
//!     KeySource::File("/var/lib/taskpilot/auth/store.key".into()),
//! )?;
//! // wire stores.clients / stores.refresh_tokens / stores.sessions
//! // into taskpilot_auth::AuthorizationServer, then on exit:
//! stores.shutdown().await?;
//! ```

pub mod client;
pub mod encryption;
pub mod file_store;
pub mod refresh_token;
pub mod session;

use std::path::Path;
use std::sync::Arc;

use taskpilot_auth::{AuthError, AuthResult};

pub use client::{CLIENTS_FILE, FileClientStore};
pub use encryption::{CryptoError, EncryptionService, KEY_SIZE, KeySource};
pub use file_store::EncryptedSnapshotStore;
pub use refresh_token::{FileRefreshTokenStore, REFRESH_TOKENS_FILE};
pub use session::{FileSessionStore, SESSIONS_FILE};

/// The three file-backed stores, opened over one encryption key.
pub struct FileAuthStores {
    /// Client registrations.
    pub clients: Arc<FileClientStore>,
    /// Refresh tokens.
    pub refresh_tokens: Arc<FileRefreshTokenStore>,
    /// User sessions.
    pub sessions: Arc<FileSessionStore>,
}

impl FileAuthStores {
    /// Opens all three stores under `base_path`.
    ///
    /// Must run inside a Tokio runtime; each store spawns its writer
    /// task.
    ///
    /// # Errors
    ///
    /// Returns an error if the encryption key cannot be obtained. Store
    /// file problems do not fail open; they are logged and the affected
    /// store starts empty.
    pub fn open(base_path: &Path, key_source: KeySource) -> AuthResult<Self> {
        let encryption = EncryptionService::initialize(key_source)
            .map_err(|e| AuthError::configuration(format!("encryption key: {e}")))?;

        Ok(Self {
            clients: Arc::new(FileClientStore::open(base_path, encryption.clone())),
            refresh_tokens: Arc::new(FileRefreshTokenStore::open(base_path, encryption.clone())),
            sessions: Arc::new(FileSessionStore::open(base_path, encryption)),
        })
    }

    /// Flushes and shuts down all three stores.
    ///
    /// # Errors
    ///
    /// Returns the first shutdown error encountered; the remaining
    /// stores are still shut down.
    pub async fn shutdown(&self) -> AuthResult<()> {
        use taskpilot_auth::storage::{ClientStorage, RefreshTokenStorage, SessionStorage};

        let results = [
            ClientStorage::shutdown(self.clients.as_ref()).await,
            RefreshTokenStorage::shutdown(self.refresh_tokens.as_ref()).await,
            SessionStorage::shutdown(self.sessions.as_ref()).await,
        ];
        for result in results {
            result?;
        }
        Ok(())
    }
}
