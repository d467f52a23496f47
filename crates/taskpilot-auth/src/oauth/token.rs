//! OAuth 2.0 token endpoint wire types.
//!
//! These are the serde shapes an HTTP layer serializes directly: the
//! RFC 6749 token response and error response bodies.

use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// Successful token endpoint response (RFC 6749 section 5.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenResponse {
    /// The signed JWT access token.
    pub access_token: String,

    /// Always "Bearer".
    pub token_type: String,

    /// Access token lifetime in seconds.
    pub expires_in: i64,

    /// Opaque refresh token, already rotated in for this response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Granted scopes (space-separated).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Machine-readable token endpoint error codes (RFC 6749 section 5.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenErrorCode {
    /// Malformed or incomplete request.
    InvalidRequest,
    /// Client authentication failed or unknown client.
    InvalidClient,
    /// Bad, expired, consumed, or rotated grant.
    InvalidGrant,
    /// The client may not use this grant type.
    UnauthorizedClient,
    /// The grant type is not supported at all.
    UnsupportedGrantType,
    /// The requested scope is invalid or exceeds the grant.
    InvalidScope,
    /// The resource owner or server denied the request.
    AccessDenied,
    /// Internal failure unrelated to the request.
    ServerError,
}

impl TokenErrorCode {
    /// HTTP status the error should be served with.
    #[must_use]
    pub fn http_status(&self) -> u16 {
        match self {
            Self::InvalidClient => 401,
            Self::AccessDenied => 403,
            Self::ServerError => 500,
            Self::InvalidRequest
            | Self::InvalidGrant
            | Self::UnauthorizedClient
            | Self::UnsupportedGrantType
            | Self::InvalidScope => 400,
        }
    }

    /// The wire string for this code.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::InvalidClient => "invalid_client",
            Self::InvalidGrant => "invalid_grant",
            Self::UnauthorizedClient => "unauthorized_client",
            Self::UnsupportedGrantType => "unsupported_grant_type",
            Self::InvalidScope => "invalid_scope",
            Self::AccessDenied => "access_denied",
            Self::ServerError => "server_error",
        }
    }
}

/// Token endpoint error response body (RFC 6749 section 5.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenError {
    /// Machine-readable error code.
    pub error: TokenErrorCode,

    /// Human-readable detail. Never contains token or code values.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl TokenError {
    /// Creates an error response with a description.
    #[must_use]
    pub fn new(error: TokenErrorCode, description: impl Into<String>) -> Self {
        Self {
            error,
            error_description: Some(description.into()),
        }
    }
}

impl From<&AuthError> for TokenError {
    fn from(err: &AuthError) -> Self {
        let code = match err.oauth_error_code() {
            "invalid_client" => TokenErrorCode::InvalidClient,
            "invalid_grant" => TokenErrorCode::InvalidGrant,
            "invalid_scope" => TokenErrorCode::InvalidScope,
            "access_denied" => TokenErrorCode::AccessDenied,
            "server_error" => TokenErrorCode::ServerError,
            _ => TokenErrorCode::InvalidRequest,
        };
        // server-side detail stays in the logs, not on the wire
        let description = if err.is_server_error() {
            None
        } else {
            Some(err.to_string())
        };
        Self {
            error: code,
            error_description: description,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_http_status_mapping() {
        assert_eq!(TokenErrorCode::InvalidClient.http_status(), 401);
        assert_eq!(TokenErrorCode::AccessDenied.http_status(), 403);
        assert_eq!(TokenErrorCode::InvalidGrant.http_status(), 400);
        assert_eq!(TokenErrorCode::ServerError.http_status(), 500);
    }

    #[test]
    fn test_error_serialization() {
        let err = TokenError::new(TokenErrorCode::InvalidGrant, "authorization code expired");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["error"], "invalid_grant");
        assert_eq!(json["error_description"], "authorization code expired");
    }

    #[test]
    fn test_from_auth_error() {
        let err = AuthError::invalid_grant("refresh token rotated");
        let wire = TokenError::from(&err);
        assert_eq!(wire.error, TokenErrorCode::InvalidGrant);
        assert!(wire.error_description.unwrap().contains("rotated"));

        // internal detail is not exposed
        let err = AuthError::storage("disk full at /var/lib");
        let wire = TokenError::from(&err);
        assert_eq!(wire.error, TokenErrorCode::ServerError);
        assert!(wire.error_description.is_none());
    }

    #[test]
    fn test_response_omits_empty_fields() {
        let resp = TokenResponse {
            access_token: "jwt".to_string(),
            token_type: "Bearer".to_string(),
            expires_in: 3600,
            refresh_token: None,
            scope: None,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert!(!json.contains("refresh_token"));
        assert!(!json.contains("scope"));
    }
}
