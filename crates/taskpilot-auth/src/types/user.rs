//! User directory and credential hashing.
//!
//! The embedding host owns user provisioning; this module holds the
//! read-only directory the authorization server consults at login time
//! and the Argon2id helpers used for both user passwords and client
//! secrets.
//!
//! # Security
//!
//! - Hashing uses Argon2id (hybrid mode) with default parameters
//! - Salts come from OsRng
//! - Stored credentials are PHC strings; verification is constant-time

use std::collections::HashMap;

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

/// A user known to the directory.
#[derive(Debug, Clone)]
pub struct User {
    /// Stable user identifier, used as the JWT `sub` claim.
    pub id: String,

    /// Login name.
    pub username: String,

    /// Argon2id PHC hash of the password.
    pub password_hash: String,
}

/// In-memory username lookup table provided by the embedding host.
///
/// The directory is immutable for the lifetime of the server; account
/// management happens outside the authorization flow.
#[derive(Debug, Clone, Default)]
pub struct UserDirectory {
    users: HashMap<String, User>,
}

impl UserDirectory {
    /// Create an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user with an already-hashed password.
    #[must_use]
    pub fn with_user(mut self, user: User) -> Self {
        self.users.insert(user.username.clone(), user);
        self
    }

    /// Add a user, hashing the plaintext password.
    ///
    /// # Errors
    ///
    /// Returns `argon2::password_hash::Error` if hashing fails (rare).
    pub fn with_password(
        self,
        id: impl Into<String>,
        username: impl Into<String>,
        password: &str,
    ) -> Result<Self, argon2::password_hash::Error> {
        let username = username.into();
        let user = User {
            id: id.into(),
            username: username.clone(),
            password_hash: hash_secret(password)?,
        };
        Ok(self.with_user(user))
    }

    /// Look up a user by username.
    #[must_use]
    pub fn find(&self, username: &str) -> Option<&User> {
        self.users.get(username)
    }

    /// Verify a username/password pair, returning the user on success.
    ///
    /// Returns `None` for unknown usernames and wrong passwords alike;
    /// callers cannot distinguish the two.
    #[must_use]
    pub fn verify(&self, username: &str, password: &str) -> Option<&User> {
        let user = self.users.get(username)?;
        verify_secret(password, &user.password_hash).then_some(user)
    }

    /// Number of users in the directory.
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Returns `true` if the directory has no users.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

/// Hash a credential with Argon2id for storage.
///
/// # Errors
///
/// Returns `argon2::password_hash::Error` if hashing fails (rare).
pub fn hash_secret(secret: &str) -> Result<String, argon2::password_hash::Error> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default().hash_password(secret.as_bytes(), &salt)?;
    Ok(hash.to_string())
}

/// Verify a credential against a stored PHC hash.
///
/// Returns `false` for malformed hashes as well as mismatches.
#[must_use]
pub fn verify_secret(secret: &str, hash: &str) -> bool {
    PasswordHash::new(hash)
        .map(|parsed| {
            Argon2::default()
                .verify_password(secret.as_bytes(), &parsed)
                .is_ok()
        })
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_secret("correct horse battery staple").unwrap();
        assert!(hash.starts_with("$argon2id$"));
        assert!(verify_secret("correct horse battery staple", &hash));
        assert!(!verify_secret("wrong password", &hash));
    }

    #[test]
    fn test_hashes_are_salted() {
        let h1 = hash_secret("same-input").unwrap();
        let h2 = hash_secret("same-input").unwrap();
        assert_ne!(h1, h2);
    }

    #[test]
    fn test_verify_malformed_hash() {
        assert!(!verify_secret("password", "not-a-phc-string"));
        assert!(!verify_secret("password", ""));
    }

    #[test]
    fn test_directory_verify() {
        let directory = UserDirectory::new()
            .with_password("user-1", "alice", "hunter2!")
            .unwrap();

        let user = directory.verify("alice", "hunter2!").expect("valid login");
        assert_eq!(user.id, "user-1");

        assert!(directory.verify("alice", "wrong").is_none());
        assert!(directory.verify("bob", "hunter2!").is_none());
    }

    #[test]
    fn test_directory_find() {
        let directory = UserDirectory::new()
            .with_password("user-1", "alice", "pw")
            .unwrap();
        assert!(directory.find("alice").is_some());
        assert!(directory.find("mallory").is_none());
        assert_eq!(directory.len(), 1);
        assert!(!directory.is_empty());
    }
}
