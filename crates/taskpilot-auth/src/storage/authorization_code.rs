//! Authorization code storage.
//!
//! Codes are minute-scale and single-use, so they are not persisted;
//! the in-memory store below is the production implementation. A restart
//! drops outstanding codes, which callers observe as `invalid_grant`,
//! the same outcome as expiry.

use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::Mutex;

use crate::AuthResult;
use crate::error::AuthError;
use crate::types::authorization_code::AuthorizationCode;

/// Storage trait for authorization codes.
#[async_trait]
pub trait AuthorizationCodeStorage: Send + Sync {
    /// Stores a newly issued code.
    ///
    /// # Errors
    ///
    /// Returns an error if the code cannot be stored.
    async fn create(&self, code: &AuthorizationCode) -> AuthResult<()>;

    /// Atomically consumes a code, returning its record exactly once.
    ///
    /// Lookup, validity check, and consumption happen in one critical
    /// section: of two concurrent exchanges of the same code, exactly
    /// one succeeds.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidGrant` if the code is unknown,
    /// expired, or already consumed.
    async fn consume(&self, code: &str) -> AuthResult<AuthorizationCode>;

    /// Removes expired and consumed codes.
    ///
    /// Returns the number of codes removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    async fn cleanup_expired(&self) -> AuthResult<usize>;
}

/// In-memory authorization code store.
#[derive(Debug, Default)]
pub struct InMemoryAuthorizationCodeStore {
    codes: Mutex<HashMap<String, AuthorizationCode>>,
}

impl InMemoryAuthorizationCodeStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AuthorizationCodeStorage for InMemoryAuthorizationCodeStore {
    async fn create(&self, code: &AuthorizationCode) -> AuthResult<()> {
        let mut codes = self.codes.lock().await;
        if codes.contains_key(&code.code) {
            return Err(AuthError::internal("authorization code collision"));
        }
        codes.insert(code.code.clone(), code.clone());
        Ok(())
    }

    async fn consume(&self, code: &str) -> AuthResult<AuthorizationCode> {
        let mut codes = self.codes.lock().await;
        let record = codes
            .get_mut(code)
            .ok_or_else(|| AuthError::invalid_grant("unknown authorization code"))?;

        if record.is_expired() {
            return Err(AuthError::invalid_grant("authorization code expired"));
        }
        if record.is_consumed() {
            return Err(AuthError::invalid_grant("authorization code already used"));
        }

        record.consumed_at = Some(OffsetDateTime::now_utc());
        Ok(record.clone())
    }

    async fn cleanup_expired(&self) -> AuthResult<usize> {
        let mut codes = self.codes.lock().await;
        let before = codes.len();
        codes.retain(|_, c| c.is_valid());
        Ok(before - codes.len())
    }
}
