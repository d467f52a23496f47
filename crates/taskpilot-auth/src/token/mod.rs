//! Access token issuance and verification.

pub mod jwt;

pub use jwt::{
    AccessTokenClaims, InvalidTokenReason, IssueParams, IssuedToken, JwtError, JwtService,
    SigningKeyPair, TokenVerification, extract_bearer_token,
};
