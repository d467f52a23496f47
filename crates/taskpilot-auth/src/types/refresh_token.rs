//! Refresh token domain type.
//!
//! # Security
//!
//! - Tokens are stored as SHA-256 hashes, never plaintext
//! - Every use rotates the token; the previous value stops working
//! - Expired and revoked tokens are swept by `cleanup_expired`

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// A refresh token record as persisted by the refresh token store.
///
/// The token value itself never appears here. Validation hashes the
/// incoming token and looks the record up by hash, the same way password
/// storage works.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshToken {
    /// Unique identifier for this record.
    pub id: Uuid,

    /// SHA-256 hash of the token value. The plaintext is returned to the
    /// client once and never stored.
    pub token_hash: String,

    /// Client this token was issued to.
    pub client_id: String,

    /// User who authorized this token.
    pub user_id: String,

    /// Granted scopes (space-separated). Carried unchanged across
    /// rotations.
    pub scope: String,

    /// When this token was created.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// When this token expires. Rotation keeps the original expiry, so a
    /// token chain cannot outlive its first grant.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
}

impl RefreshToken {
    /// Returns `true` if this token has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        OffsetDateTime::now_utc() > self.expires_at
    }

    /// Hash a token value with SHA-256.
    ///
    /// Used both when storing new tokens and when looking up presented
    /// tokens.
    #[must_use]
    pub fn hash_token(token: &str) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(token.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Generate a cryptographically secure random token.
    ///
    /// 256 bits encoded as base64url (43 characters).
    #[must_use]
    pub fn generate_token() -> String {
        use base64::Engine;
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;

        let mut bytes = [0u8; 32];
        rand::Rng::fill(&mut rand::thread_rng(), &mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }

    /// Build the rotated replacement for this token.
    ///
    /// Returns the new record plus the plaintext token to hand to the
    /// client. Scope, user, client, and the original `expires_at` carry
    /// over.
    #[must_use]
    pub fn rotated(&self) -> (Self, String) {
        let token = Self::generate_token();
        let record = Self {
            id: Uuid::new_v4(),
            token_hash: Self::hash_token(&token),
            client_id: self.client_id.clone(),
            user_id: self.user_id.clone(),
            scope: self.scope.clone(),
            created_at: OffsetDateTime::now_utc(),
            expires_at: self.expires_at,
        };
        (record, token)
    }
}
