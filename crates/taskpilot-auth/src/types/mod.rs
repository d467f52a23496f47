//! Domain types for the authorization server.
//!
//! These are the records the storage traits persist and the orchestrator
//! operates on: client registrations, authorization codes, refresh tokens,
//! user sessions, and the user directory.

pub mod authorization_code;
pub mod client;
pub mod refresh_token;
pub mod session;
pub mod user;

pub use authorization_code::AuthorizationCode;
pub use client::{Client, ClientMetadata, ClientType, RegisteredClient};
pub use refresh_token::RefreshToken;
pub use session::UserSession;
pub use user::{User, UserDirectory};
