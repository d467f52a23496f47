//! Client registration storage trait.

use async_trait::async_trait;

use crate::AuthResult;
use crate::types::client::Client;

/// Storage trait for OAuth client registrations.
///
/// # Implementations
///
/// - `taskpilot-auth-file` - encrypted file storage backend
#[async_trait]
pub trait ClientStorage: Send + Sync {
    /// Stores a new client registration.
    ///
    /// # Errors
    ///
    /// Returns an error on duplicate `client_id` or storage failure.
    async fn create(&self, client: &Client) -> AuthResult<()>;

    /// Finds a client by its `client_id`.
    ///
    /// Returns `None` if no such client is registered.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn find_by_client_id(&self, client_id: &str) -> AuthResult<Option<Client>>;

    /// Deletes a client registration.
    ///
    /// Returns `true` if a client was removed, `false` if none existed.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn delete(&self, client_id: &str) -> AuthResult<bool>;

    /// Lists all registered clients.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn list(&self) -> AuthResult<Vec<Client>>;

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
