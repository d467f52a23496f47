//! JWT access token issuance and verification.
//!
//! Access tokens are RS256-signed JWTs. The signing key pair is either
//! generated at startup or loaded from PEM material supplied by the
//! embedding host; verification uses the public half only.
//!
//! Verification deliberately does not return `Result` for ordinary
//! failures. An expired or forged token is an expected input at a token
//! boundary, so [`JwtService::verify`] reports it as data
//! ([`TokenVerification::Invalid`]) rather than an error.
//!
//! ## Example
//!
//! ```ignore
//! use taskpilot_auth::token::{IssueParams, JwtService, SigningKeyPair};
//!
//! let key_pair = SigningKeyPair::generate()?;
//! let service = JwtService::new(key_pair, "https://auth.local", 3600);
//!
//! let issued = service.issue(IssueParams { /* ... */ })?;
//! let verification = service.verify(&issued.access_token, Some("taskpilot-mcp"));
//! ```

use jsonwebtoken::{
    Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode,
};
use rand::rngs::OsRng;
use rsa::RsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

// ============================================================================
// Error Types
// ============================================================================

/// Errors that can occur during JWT key handling and encoding.
///
/// Validation failures are not errors; see [`TokenVerification`].
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to encode a token.
    #[error("Failed to encode token: {message}")]
    EncodingError {
        /// Description of the encoding error.
        message: String,
    },

    /// Failed to generate a signing key.
    #[error("Key generation error: {message}")]
    KeyGenerationError {
        /// Description of the key generation error.
        message: String,
    },

    /// Invalid key format or data.
    #[error("Invalid key: {message}")]
    InvalidKey {
        /// Description of why the key is invalid.
        message: String,
    },
}

impl JwtError {
    /// Creates a new `EncodingError`.
    #[must_use]
    pub fn encoding_error(message: impl Into<String>) -> Self {
        Self::EncodingError {
            message: message.into(),
        }
    }

    /// Creates a new `KeyGenerationError`.
    #[must_use]
    pub fn key_generation_error(message: impl Into<String>) -> Self {
        Self::KeyGenerationError {
            message: message.into(),
        }
    }

    /// Creates a new `InvalidKey` error.
    #[must_use]
    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKey {
            message: message.into(),
        }
    }
}

// ============================================================================
// Claims
// ============================================================================

/// Claims carried by every issued access token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AccessTokenClaims {
    /// Issuer (this authorization server).
    pub iss: String,

    /// Subject (user ID).
    pub sub: String,

    /// Audience (the protected resource, e.g. the MCP endpoint).
    pub aud: String,

    /// OAuth client the token was issued to.
    pub client_id: String,

    /// Space-separated scopes.
    pub scope: String,

    /// Unique token identifier.
    pub jti: String,

    /// Issued at (Unix timestamp).
    pub iat: i64,

    /// Expiration time (Unix timestamp).
    pub exp: i64,
}

// ============================================================================
// Verification result
// ============================================================================

/// Why a token failed verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvalidTokenReason {
    /// The token's `exp` is in the past.
    Expired,
    /// The signature does not verify against the server's public key.
    InvalidSignature,
    /// The `aud` claim does not match the expected audience.
    AudienceMismatch,
    /// The token is structurally broken or its claims are unusable.
    Malformed,
}

impl std::fmt::Display for InvalidTokenReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Expired => write!(f, "token expired"),
            Self::InvalidSignature => write!(f, "invalid signature"),
            Self::AudienceMismatch => write!(f, "audience mismatch"),
            Self::Malformed => write!(f, "malformed token"),
        }
    }
}

/// Outcome of verifying an access token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenVerification {
    /// The token is authentic and current.
    Valid {
        /// The verified claims.
        claims: AccessTokenClaims,
    },
    /// The token is not acceptable.
    Invalid {
        /// Why it was rejected.
        reason: InvalidTokenReason,
    },
}

impl TokenVerification {
    /// Returns `true` if the token verified.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid { .. })
    }

    /// Returns the claims if the token verified.
    #[must_use]
    pub fn claims(&self) -> Option<&AccessTokenClaims> {
        match self {
            Self::Valid { claims } => Some(claims),
            Self::Invalid { .. } => None,
        }
    }
}

// ============================================================================
// Signing Key Pair
// ============================================================================

/// An RS256 signing key pair.
///
/// RS256 is the only supported algorithm: resource servers verify with
/// the public key alone and never need the signing secret.
pub struct SigningKeyPair {
    /// Key ID, carried in the JWT header.
    pub kid: String,

    encoding_key: EncodingKey,
    decoding_key: DecodingKey,

    private_pem: String,
    public_pem: String,
}

impl SigningKeyPair {
    /// Generates a new 2048-bit RSA key pair.
    ///
    /// # Errors
    ///
    /// Returns an error if key generation or PEM encoding fails.
    pub fn generate() -> Result<Self, JwtError> {
        let private_key = RsaPrivateKey::new(&mut OsRng, 2048)
            .map_err(|e| JwtError::key_generation_error(e.to_string()))?;

        let private_pem = private_key
            .to_pkcs8_pem(LineEnding::LF)
            .map_err(|e| JwtError::key_generation_error(e.to_string()))?
            .to_string();

        let public_pem = private_key
            .to_public_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| JwtError::key_generation_error(e.to_string()))?;

        Self::from_pem(&private_pem, &public_pem)
    }

    /// Loads a key pair from PEM strings.
    ///
    /// # Errors
    ///
    /// Returns `JwtError::InvalidKey` if either PEM is not a valid RSA key.
    pub fn from_pem(private_pem: &str, public_pem: &str) -> Result<Self, JwtError> {
        // Round-trip through the rsa crate so a mismatched or truncated
        // PEM fails here instead of at first signing.
        RsaPrivateKey::from_pkcs8_pem(private_pem)
            .map_err(|e| JwtError::invalid_key(e.to_string()))?;

        let encoding_key = EncodingKey::from_rsa_pem(private_pem.as_bytes())
            .map_err(|e| JwtError::invalid_key(e.to_string()))?;
        let decoding_key = DecodingKey::from_rsa_pem(public_pem.as_bytes())
            .map_err(|e| JwtError::invalid_key(e.to_string()))?;

        Ok(Self {
            kid: Uuid::new_v4().to_string(),
            encoding_key,
            decoding_key,
            private_pem: private_pem.to_string(),
            public_pem: public_pem.to_string(),
        })
    }

    /// Exports the key pair as `(private_pem, public_pem)` so the
    /// embedding host can persist it across restarts.
    #[must_use]
    pub fn to_pem(&self) -> (&str, &str) {
        (&self.private_pem, &self.public_pem)
    }

    /// Exports the public key PEM for resource servers.
    #[must_use]
    pub fn public_pem(&self) -> &str {
        &self.public_pem
    }
}

// ============================================================================
// JWT Service
// ============================================================================

/// Parameters for issuing an access token.
#[derive(Debug, Clone)]
pub struct IssueParams {
    /// OAuth client the token is issued to.
    pub client_id: String,
    /// User the token acts for.
    pub user_id: String,
    /// Granted scopes (space-separated).
    pub scope: String,
    /// Intended audience.
    pub audience: String,
}

/// An issued access token in OAuth token-response shape.
#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    /// The signed JWT.
    pub access_token: String,
    /// Always "Bearer".
    pub token_type: &'static str,
    /// Lifetime in seconds.
    pub expires_in: i64,
    /// Granted scopes.
    pub scope: String,
}

/// Service for issuing and verifying RS256 access tokens.
///
/// Thread-safe; share it behind an `Arc`.
pub struct JwtService {
    signing_key: SigningKeyPair,
    issuer: String,
    token_lifetime_secs: i64,
}

impl JwtService {
    /// Creates a new JWT service.
    #[must_use]
    pub fn new(
        signing_key: SigningKeyPair,
        issuer: impl Into<String>,
        token_lifetime_secs: i64,
    ) -> Self {
        Self {
            signing_key,
            issuer: issuer.into(),
            token_lifetime_secs,
        }
    }

    /// Issues a signed access token.
    ///
    /// # Errors
    ///
    /// Returns an error only if signing itself fails.
    pub fn issue(&self, params: IssueParams) -> Result<IssuedToken, JwtError> {
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let claims = AccessTokenClaims {
            iss: self.issuer.clone(),
            sub: params.user_id,
            aud: params.audience,
            client_id: params.client_id,
            scope: params.scope.clone(),
            jti: Uuid::new_v4().to_string(),
            iat: now,
            exp: now + self.token_lifetime_secs,
        };

        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(self.signing_key.kid.clone());

        let access_token = encode(&header, &claims, &self.signing_key.encoding_key)
            .map_err(|e| JwtError::encoding_error(e.to_string()))?;

        Ok(IssuedToken {
            access_token,
            token_type: "Bearer",
            expires_in: self.token_lifetime_secs,
            scope: params.scope,
        })
    }

    /// Verifies an access token.
    ///
    /// When `expected_audience` is given, the `aud` claim must match it.
    /// All rejections come back as [`TokenVerification::Invalid`]; this
    /// method never fails.
    #[must_use]
    pub fn verify(&self, token: &str, expected_audience: Option<&str>) -> TokenVerification {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.issuer]);
        validation.validate_exp = true;
        // the default 60s leeway would keep tokens alive past exp
        validation.leeway = 0;
        match expected_audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }

        match decode::<AccessTokenClaims>(token, &self.signing_key.decoding_key, &validation) {
            Ok(data) => TokenVerification::Valid {
                claims: data.claims,
            },
            Err(err) => {
                use jsonwebtoken::errors::ErrorKind;
                let reason = match err.kind() {
                    ErrorKind::ExpiredSignature => InvalidTokenReason::Expired,
                    ErrorKind::InvalidSignature => InvalidTokenReason::InvalidSignature,
                    ErrorKind::InvalidAudience => InvalidTokenReason::AudienceMismatch,
                    _ => InvalidTokenReason::Malformed,
                };
                TokenVerification::Invalid { reason }
            }
        }
    }

    /// Returns the issuer URL.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Returns the configured token lifetime in seconds.
    #[must_use]
    pub fn token_lifetime_secs(&self) -> i64 {
        self.token_lifetime_secs
    }

    /// Returns the signing key pair.
    #[must_use]
    pub fn signing_key(&self) -> &SigningKeyPair {
        &self.signing_key
    }
}

/// Extracts the token from an `Authorization: Bearer <token>` header value.
///
/// The scheme comparison is case-insensitive per RFC 7235; returns `None`
/// for other schemes or an empty token.
#[must_use]
pub fn extract_bearer_token(header: &str) -> Option<&str> {
    let (scheme, rest) = header.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = rest.trim();
    (!token.is_empty()).then_some(token)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> JwtService {
        let key_pair = SigningKeyPair::generate().unwrap();
        JwtService::new(key_pair, "https://auth.taskpilot.local", 3600)
    }

    fn params() -> IssueParams {
        IssueParams {
            client_id: "client-1".to_string(),
            user_id: "user-1".to_string(),
            scope: "tasks:read tasks:write".to_string(),
            audience: "taskpilot-mcp".to_string(),
        }
    }

    #[test]
    fn test_generate_key_pair() {
        let key_pair = SigningKeyPair::generate().unwrap();
        assert!(!key_pair.kid.is_empty());
        let (private_pem, public_pem) = key_pair.to_pem();
        assert!(private_pem.contains("PRIVATE KEY"));
        assert!(public_pem.contains("PUBLIC KEY"));
    }

    #[test]
    fn test_key_pair_pem_round_trip() {
        let original = SigningKeyPair::generate().unwrap();
        let (private_pem, public_pem) = original.to_pem();
        let reloaded = SigningKeyPair::from_pem(private_pem, public_pem).unwrap();

        // token signed by the original verifies under the reloaded key
        let issuing = JwtService::new(original, "iss", 3600);
        let verifying = JwtService::new(reloaded, "iss", 3600);
        let token = issuing.issue(params()).unwrap().access_token;
        assert!(verifying.verify(&token, None).is_valid());
    }

    #[test]
    fn test_from_pem_rejects_garbage() {
        assert!(matches!(
            SigningKeyPair::from_pem("not a pem", "also not a pem"),
            Err(JwtError::InvalidKey { .. })
        ));
    }

    #[test]
    fn test_issue_and_verify() {
        let service = service();
        let issued = service.issue(params()).unwrap();

        assert_eq!(issued.token_type, "Bearer");
        assert_eq!(issued.expires_in, 3600);
        assert_eq!(issued.scope, "tasks:read tasks:write");

        let verification = service.verify(&issued.access_token, Some("taskpilot-mcp"));
        let claims = verification.claims().expect("valid token");
        assert_eq!(claims.iss, "https://auth.taskpilot.local");
        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.aud, "taskpilot-mcp");
        assert_eq!(claims.client_id, "client-1");
        assert_eq!(claims.scope, "tasks:read tasks:write");
        assert!(!claims.jti.is_empty());
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_jti_unique_per_token() {
        let service = service();
        let t1 = service.issue(params()).unwrap().access_token;
        let t2 = service.issue(params()).unwrap().access_token;

        let c1 = service.verify(&t1, None).claims().unwrap().jti.clone();
        let c2 = service.verify(&t2, None).claims().unwrap().jti.clone();
        assert_ne!(c1, c2);
    }

    #[test]
    fn test_verify_expired_token() {
        let key_pair = SigningKeyPair::generate().unwrap();
        let service = JwtService::new(key_pair, "iss", -10);
        let issued = service.issue(params()).unwrap();

        assert_eq!(
            service.verify(&issued.access_token, None),
            TokenVerification::Invalid {
                reason: InvalidTokenReason::Expired
            }
        );
    }

    #[test]
    fn test_expiry_has_no_leeway() {
        // a token even one second past exp must not verify
        let key_pair = SigningKeyPair::generate().unwrap();
        let service = JwtService::new(key_pair, "iss", -1);
        let issued = service.issue(params()).unwrap();

        assert_eq!(
            service.verify(&issued.access_token, None),
            TokenVerification::Invalid {
                reason: InvalidTokenReason::Expired
            }
        );
    }

    #[test]
    fn test_verify_wrong_key() {
        let issuing = service();
        let verifying = service();
        let token = issuing.issue(params()).unwrap().access_token;

        assert_eq!(
            verifying.verify(&token, None),
            TokenVerification::Invalid {
                reason: InvalidTokenReason::InvalidSignature
            }
        );
    }

    #[test]
    fn test_verify_audience_mismatch() {
        let service = service();
        let token = service.issue(params()).unwrap().access_token;

        assert!(service.verify(&token, Some("taskpilot-mcp")).is_valid());
        assert_eq!(
            service.verify(&token, Some("other-service")),
            TokenVerification::Invalid {
                reason: InvalidTokenReason::AudienceMismatch
            }
        );
        // no expected audience means aud is not checked
        assert!(service.verify(&token, None).is_valid());
    }

    #[test]
    fn test_verify_malformed_token() {
        let service = service();
        assert_eq!(
            service.verify("not.a.jwt", None),
            TokenVerification::Invalid {
                reason: InvalidTokenReason::Malformed
            }
        );
        assert_eq!(
            service.verify("", None),
            TokenVerification::Invalid {
                reason: InvalidTokenReason::Malformed
            }
        );
    }

    #[test]
    fn test_extract_bearer_token() {
        assert_eq!(extract_bearer_token("Bearer abc123"), Some("abc123"));
        assert_eq!(extract_bearer_token("bearer abc123"), Some("abc123"));
        assert_eq!(extract_bearer_token("BEARER abc123"), Some("abc123"));
        assert_eq!(extract_bearer_token("  Bearer abc123  "), Some("abc123"));
        assert_eq!(extract_bearer_token("Basic dXNlcjpwdw=="), None);
        assert_eq!(extract_bearer_token("Bearer "), None);
        assert_eq!(extract_bearer_token("Bearer"), None);
        assert_eq!(extract_bearer_token(""), None);
    }
}
