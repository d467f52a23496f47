//! # taskpilot-auth
//!
//! Embedded OAuth 2.0 authorization server for the Taskpilot MCP host.
//!
//! This crate provides:
//! - Dynamic client registration (public and confidential clients)
//! - Authorization code flow with mandatory PKCE (S256 only)
//! - RS256 JWT access tokens and rotating opaque refresh tokens
//! - Password-based user sessions gating the authorization endpoint
//! - Storage traits for durable backends
//!
//! ## Overview
//!
//! The server runs inside the host process; there is no standalone
//! daemon. The embedding host wires an [`oauth::AuthorizationServer`]
//! from storage implementations (see the `taskpilot-auth-file` crate for
//! the encrypted file backend), a user directory, and an explicit
//! [`AuthConfig`], then maps its methods onto whatever HTTP surface it
//! exposes.
//!
//! ## Modules
//!
//! - [`config`] - Server configuration
//! - [`error`] - Error taxonomy with RFC 6749 error-code mapping
//! - [`oauth`] - PKCE, wire types, and the orchestrator
//! - [`token`] - JWT access token issuance and verification
//! - [`storage`] - Storage traits plus the in-memory code store
//! - [`types`] - Domain records (clients, codes, tokens, sessions, users)

pub mod config;
pub mod error;
pub mod oauth;
pub mod storage;
pub mod token;
pub mod types;

pub use config::{AuthConfig, SigningKeys};
pub use error::{AuthError, ErrorCategory};
pub use oauth::{
    AuthorizationRequest, AuthorizationServer, CodeExchangeRequest, CompletedAuthorization,
    PkceChallenge, PkceChallengeMethod, PkceError, PkceVerifier, TokenError, TokenErrorCode,
    TokenResponse, build_jwt_service,
};
pub use storage::{
    AuthorizationCodeStorage, ClientStorage, InMemoryAuthorizationCodeStore, RefreshTokenStorage,
    SessionStorage,
};
pub use token::{
    AccessTokenClaims, InvalidTokenReason, IssueParams, IssuedToken, JwtError, JwtService,
    SigningKeyPair, TokenVerification, extract_bearer_token,
};
pub use types::{
    AuthorizationCode, Client, ClientMetadata, ClientType, RefreshToken, RegisteredClient, User,
    UserDirectory, UserSession,
};

/// Type alias for authorization server results.
pub type AuthResult<T> = Result<T, AuthError>;
