//! OAuth 2.0 client registration types.
//!
//! Clients register dynamically at runtime. Public clients (the common
//! case for MCP frontends) carry no secret and must use PKCE; confidential
//! clients receive a generated secret that is stored Argon2id-hashed.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::AuthError;
use crate::types::user::{hash_secret, verify_secret};

// =============================================================================
// Client type
// =============================================================================

/// Whether a client can keep a secret.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientType {
    /// Browser or native app that cannot protect a secret. Must use PKCE.
    #[default]
    Public,
    /// Server-side client that authenticates with a client secret.
    Confidential,
}

impl ClientType {
    /// Returns the registration parameter value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Confidential => "confidential",
        }
    }
}

impl std::fmt::Display for ClientType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// =============================================================================
// Registration metadata
// =============================================================================

/// Metadata submitted by a client at dynamic registration time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientMetadata {
    /// Human-readable display name.
    pub client_name: String,

    /// Allowed redirect URIs for the authorization code flow.
    pub redirect_uris: Vec<String>,

    /// Public or confidential.
    #[serde(default)]
    pub client_type: ClientType,

    /// Scopes this client is allowed to request. Empty means any.
    #[serde(default)]
    pub scopes: Vec<String>,
}

impl ClientMetadata {
    /// Validate the metadata before registration.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidRequest` if the name is empty, no
    /// redirect URI is given, or a redirect URI is not an absolute URI.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.client_name.trim().is_empty() {
            return Err(AuthError::invalid_request("client_name must not be empty"));
        }
        if self.redirect_uris.is_empty() {
            return Err(AuthError::invalid_request(
                "at least one redirect_uri is required",
            ));
        }
        for uri in &self.redirect_uris {
            if !uri.contains("://") || uri.contains(char::is_whitespace) {
                return Err(AuthError::invalid_request(format!(
                    "redirect_uri is not an absolute URI: {uri}"
                )));
            }
        }
        Ok(())
    }
}

// =============================================================================
// Client
// =============================================================================

/// A registered OAuth 2.0 client as persisted by the client store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    /// Unique client identifier used in OAuth flows.
    pub client_id: String,

    /// Argon2id PHC hash of the client secret (confidential clients only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_hash: Option<String>,

    /// Human-readable display name.
    pub client_name: String,

    /// Allowed redirect URIs. Matching is exact string comparison.
    pub redirect_uris: Vec<String>,

    /// Public or confidential.
    pub client_type: ClientType,

    /// Scopes this client may request. Empty means any.
    #[serde(default)]
    pub scopes: Vec<String>,

    /// When this client was registered.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Client {
    /// Returns `true` if this client holds a hashed secret.
    #[must_use]
    pub fn is_confidential(&self) -> bool {
        self.client_type == ClientType::Confidential
    }

    /// Returns `true` if `redirect_uri` exactly matches a registered URI.
    ///
    /// No prefix, wildcard, or normalization matching. Exact string
    /// equality only.
    #[must_use]
    pub fn validate_redirect_uri(&self, redirect_uri: &str) -> bool {
        self.redirect_uris.iter().any(|uri| uri == redirect_uri)
    }

    /// Returns `true` if the client may request `scope`.
    #[must_use]
    pub fn allows_scope(&self, scope: &str) -> bool {
        if self.scopes.is_empty() {
            return true;
        }
        scope
            .split_whitespace()
            .all(|s| self.scopes.iter().any(|allowed| allowed == s))
    }

    /// Verify a presented client secret against the stored hash.
    ///
    /// Constant-time via the argon2 crate. Always `false` for public
    /// clients, which have no secret.
    #[must_use]
    pub fn verify_secret(&self, secret: &str) -> bool {
        match &self.secret_hash {
            Some(hash) => verify_secret(secret, hash),
            None => false,
        }
    }
}

/// Result of a successful dynamic registration.
///
/// The plaintext secret appears here exactly once; only its hash is
/// persisted.
#[derive(Debug, Clone)]
pub struct RegisteredClient {
    /// The stored client record.
    pub client: Client,

    /// Plaintext secret for confidential clients. Shown once.
    pub client_secret: Option<String>,
}

/// Build a `Client` record (and plaintext secret where applicable) from
/// validated registration metadata.
///
/// # Errors
///
/// Returns `AuthError::Internal` if secret hashing fails.
pub fn build_client(metadata: &ClientMetadata) -> Result<RegisteredClient, AuthError> {
    let client_id = Uuid::new_v4().to_string();

    let (secret, secret_hash) = match metadata.client_type {
        ClientType::Public => (None, None),
        ClientType::Confidential => {
            let secret = crate::types::refresh_token::RefreshToken::generate_token();
            let hash = hash_secret(&secret)
                .map_err(|e| AuthError::internal(format!("secret hashing failed: {e}")))?;
            (Some(secret), Some(hash))
        }
    };

    Ok(RegisteredClient {
        client: Client {
            client_id,
            secret_hash,
            client_name: metadata.client_name.clone(),
            redirect_uris: metadata.redirect_uris.clone(),
            client_type: metadata.client_type,
            scopes: metadata.scopes.clone(),
            created_at: OffsetDateTime::now_utc(),
        },
        client_secret: secret,
    })
}
