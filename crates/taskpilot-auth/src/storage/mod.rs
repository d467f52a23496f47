//! Storage traits for authorization server data.
//!
//! This module defines storage interfaces for:
//!
//! - OAuth client registrations
//! - Authorization codes (in-memory store provided here)
//! - Refresh tokens
//! - User sessions
//!
//! # Implementations
//!
//! Durable implementations live in separate crates:
//!
//! - `taskpilot-auth-file` - encrypted file storage backend

pub mod authorization_code;
pub mod client;
pub mod refresh_token;
pub mod session;

pub use authorization_code::{AuthorizationCodeStorage, InMemoryAuthorizationCodeStore};
pub use client::ClientStorage;
pub use refresh_token::RefreshTokenStorage;
pub use session::SessionStorage;
