//! Authorization code domain type.
//!
//! Codes are single-use, minute-scale credentials binding a completed
//! user authorization (client, user, redirect URI, scope, PKCE challenge)
//! to one token-endpoint exchange. They live in memory only; a restart
//! invalidates outstanding codes the same way expiry does.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// An issued authorization code awaiting exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationCode {
    /// The opaque code value handed to the client.
    pub code: String,

    /// Client the code was issued to.
    pub client_id: String,

    /// User who approved the authorization.
    pub user_id: String,

    /// Redirect URI used in the authorization request. The token request
    /// must present the same value.
    pub redirect_uri: String,

    /// Granted scopes (space-separated).
    pub scope: String,

    /// PKCE S256 challenge the token request's verifier must match.
    pub code_challenge: String,

    /// When this code was issued.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,

    /// When this code expires.
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,

    /// When this code was exchanged (None = not yet used).
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "time::serde::rfc3339::option"
    )]
    pub consumed_at: Option<OffsetDateTime>,
}

impl AuthorizationCode {
    /// Returns `true` if this code has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        OffsetDateTime::now_utc() > self.expires_at
    }

    /// Returns `true` if this code has already been exchanged.
    #[must_use]
    pub fn is_consumed(&self) -> bool {
        self.consumed_at.is_some()
    }

    /// Returns `true` if this code can still be exchanged.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        !self.is_expired() && !self.is_consumed()
    }

    /// Generate a cryptographically secure random code.
    ///
    /// 256 bits encoded as base64url (43 characters).
    #[must_use]
    pub fn generate_code() -> String {
        use base64::Engine;
        use base64::engine::general_purpose::URL_SAFE_NO_PAD;

        let mut bytes = [0u8; 32];
        rand::Rng::fill(&mut rand::thread_rng(), &mut bytes);
        URL_SAFE_NO_PAD.encode(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn code(expires_in: Duration) -> AuthorizationCode {
        let now = OffsetDateTime::now_utc();
        AuthorizationCode {
            code: AuthorizationCode::generate_code(),
            client_id: "client-1".to_string(),
            user_id: "user-1".to_string(),
            redirect_uri: "http://localhost:3000/callback".to_string(),
            scope: "tasks:read".to_string(),
            code_challenge: "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM".to_string(),
            created_at: now,
            expires_at: now + expires_in,
            consumed_at: None,
        }
    }

    #[test]
    fn test_generate_code_shape() {
        let c = AuthorizationCode::generate_code();
        assert_eq!(c.len(), 43);
        assert_ne!(c, AuthorizationCode::generate_code());
    }

    #[test]
    fn test_validity_lifecycle() {
        let mut c = code(Duration::minutes(10));
        assert!(c.is_valid());
        assert!(!c.is_expired());
        assert!(!c.is_consumed());

        c.consumed_at = Some(OffsetDateTime::now_utc());
        assert!(c.is_consumed());
        assert!(!c.is_valid());
    }

    #[test]
    fn test_expired_code_is_invalid() {
        let c = code(Duration::minutes(-1));
        assert!(c.is_expired());
        assert!(!c.is_valid());
    }
}
