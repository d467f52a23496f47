//! User session storage trait.

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::session::UserSession;

/// Storage trait for logged-in user sessions.
///
/// # Implementations
///
/// - `taskpilot-auth-file` - encrypted file storage backend
#[async_trait]
pub trait SessionStorage: Send + Sync {
    /// Stores a new session.
    ///
    /// # Errors
    ///
    /// Returns an error if the session cannot be stored.
    async fn create(&self, session: &UserSession) -> AuthResult<()>;

    /// Finds a session by its identifier.
    ///
    /// Returns sessions regardless of expiration; callers check
    /// `is_expired()`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find(&self, session_id: &str) -> AuthResult<Option<UserSession>>;

    /// Deletes a session (logout).
    ///
    /// Returns `true` if a session was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn delete(&self, session_id: &str) -> AuthResult<bool>;

    /// Removes expired sessions.
    ///
    /// Returns the number of sessions removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn cleanup_expired(&self) -> AuthResult<usize>;

    /// Flushes pending writes and releases resources.
    ///
    /// Durable backends override this; the default is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if a pending write could not be completed.
    async fn shutdown(&self) -> AuthResult<()> {
        Ok(())
    }
}
