//! Refresh token storage trait.
//!
//! # Security Considerations
//!
//! - Tokens are stored as SHA-256 hashes only
//! - Rotation must be a single atomic step
//! - Expired tokens should be cleaned up periodically

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::refresh_token::RefreshToken;

/// Storage trait for refresh tokens.
///
/// # Implementations
///
/// - `taskpilot-auth-file` - encrypted file storage backend
#[async_trait]
pub trait RefreshTokenStorage: Send + Sync {
    /// Stores a new refresh token record.
    ///
    /// # Errors
    ///
    /// Returns an error if the token cannot be stored.
    async fn create(&self, token: &RefreshToken) -> AuthResult<()>;

    /// Finds a refresh token by its hash.
    ///
    /// Returns tokens regardless of expiration; callers check
    /// `is_expired()` before honoring them.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_hash(&self, token_hash: &str) -> AuthResult<Option<RefreshToken>>;

    /// Atomically replaces the token identified by `old_hash` with
    /// `replacement`.
    ///
    /// The removal of the old record and insertion of the new one happen
    /// in one critical section: two concurrent rotations of the same
    /// token cannot both succeed, and no interleaving can observe both
    /// tokens live. Returns the record that was replaced.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidGrant` if `old_hash` is not present
    /// (already rotated, revoked, or never issued), or a storage error.
    async fn rotate(&self, old_hash: &str, replacement: &RefreshToken)
    -> AuthResult<RefreshToken>;

    /// Removes the token identified by `token_hash`.
    ///
    /// Returns `true` if a token was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn revoke(&self, token_hash: &str) -> AuthResult<bool>;

    /// Removes all tokens issued to `client_id`.
    ///
    /// Returns the number of tokens removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn revoke_by_client(&self, client_id: &str) -> AuthResult<usize>;

    /// Removes expired tokens.
    ///
    /// Returns the number of tokens removed.
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
