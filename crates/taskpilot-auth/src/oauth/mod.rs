//! OAuth 2.0 protocol components.
//!
//! PKCE, the token endpoint wire types, and the authorization server
//! orchestrator.

pub mod pkce;
pub mod server;
pub mod token;

pub use pkce::{PkceChallenge, PkceChallengeMethod, PkceError, PkceVerifier};
pub use server::{
    AuthorizationRequest, AuthorizationServer, CodeExchangeRequest, CompletedAuthorization,
    build_jwt_service,
};
pub use token::{TokenError, TokenErrorCode, TokenResponse};
