//! Authorization server configuration.
//!
//! All configuration is explicit: the embedding process constructs an
//! [`AuthConfig`] and hands it in. There are no environment-variable
//! fallbacks and no default cryptographic material; missing key material
//! fails `validate()` instead of silently generating a throwaway.

use time::Duration;

use crate::error::AuthError;

/// Where the RS256 signing keys come from.
#[derive(Debug, Clone)]
pub enum SigningKeys {
    /// Generate a fresh 2048-bit RSA pair at startup. Tokens do not
    /// survive a restart; suitable for development.
    Generate,
    /// Load an existing pair from PEM strings.
    Pem {
        /// PKCS#8 private key PEM.
        private_pem: String,
        /// SPKI public key PEM.
        public_pem: String,
    },
}

/// Configuration for the authorization server.
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Issuer URL, used as the JWT `iss` claim.
    pub issuer: String,

    /// Audience for issued tokens, used as the JWT `aud` claim and
    /// checked at verification.
    pub audience: String,

    /// Signing key material.
    pub signing_keys: SigningKeys,

    /// Authorization code lifetime.
    pub code_lifetime: Duration,

    /// Access token lifetime.
    pub access_token_lifetime: Duration,

    /// Refresh token lifetime. Rotation does not extend it.
    pub refresh_token_lifetime: Duration,

    /// User session lifetime.
    pub session_lifetime: Duration,
}

impl AuthConfig {
    /// Creates a configuration with default lifetimes and generated keys.
    #[must_use]
    pub fn new(issuer: impl Into<String>, audience: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            audience: audience.into(),
            signing_keys: SigningKeys::Generate,
            code_lifetime: Duration::minutes(10),
            access_token_lifetime: Duration::hours(1),
            refresh_token_lifetime: Duration::days(30),
            session_lifetime: Duration::hours(24),
        }
    }

    /// Sets the signing key material.
    #[must_use]
    pub fn with_signing_keys(mut self, signing_keys: SigningKeys) -> Self {
        self.signing_keys = signing_keys;
        self
    }

    /// Sets the authorization code lifetime.
    #[must_use]
    pub fn with_code_lifetime(mut self, lifetime: Duration) -> Self {
        self.code_lifetime = lifetime;
        self
    }

    /// Sets the access token lifetime.
    #[must_use]
    pub fn with_access_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.access_token_lifetime = lifetime;
        self
    }

    /// Sets the refresh token lifetime.
    #[must_use]
    pub fn with_refresh_token_lifetime(mut self, lifetime: Duration) -> Self {
        self.refresh_token_lifetime = lifetime;
        self
    }

    /// Sets the user session lifetime.
    #[must_use]
    pub fn with_session_lifetime(mut self, lifetime: Duration) -> Self {
        self.session_lifetime = lifetime;
        self
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if the issuer or audience is
    /// empty, PEM material is blank, or any lifetime is not positive.
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.issuer.trim().is_empty() {
            return Err(AuthError::configuration("issuer must not be empty"));
        }
        if self.audience.trim().is_empty() {
            return Err(AuthError::configuration("audience must not be empty"));
        }
        if let SigningKeys::Pem {
            private_pem,
            public_pem,
        } = &self.signing_keys
        {
            if private_pem.trim().is_empty() || public_pem.trim().is_empty() {
                return Err(AuthError::configuration(
                    "signing key PEM material must not be empty",
                ));
            }
        }

        for (name, lifetime) in [
            ("code_lifetime", self.code_lifetime),
            ("access_token_lifetime", self.access_token_lifetime),
            ("refresh_token_lifetime", self.refresh_token_lifetime),
            ("session_lifetime", self.session_lifetime),
        ] {
            if !lifetime.is_positive() {
                return Err(AuthError::configuration(format!(
                    "{name} must be positive"
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AuthConfig::new("https://auth.local", "taskpilot-mcp");
        assert!(config.validate().is_ok());
        assert_eq!(config.code_lifetime, Duration::minutes(10));
        assert_eq!(config.access_token_lifetime, Duration::hours(1));
        assert_eq!(config.refresh_token_lifetime, Duration::days(30));
        assert_eq!(config.session_lifetime, Duration::hours(24));
    }

    #[test]
    fn test_builder_overrides() {
        let config = AuthConfig::new("https://auth.local", "aud")
            .with_code_lifetime(Duration::minutes(5))
            .with_access_token_lifetime(Duration::minutes(30))
            .with_refresh_token_lifetime(Duration::days(7))
            .with_session_lifetime(Duration::hours(8));
        assert!(config.validate().is_ok());
        assert_eq!(config.code_lifetime, Duration::minutes(5));
        assert_eq!(config.refresh_token_lifetime, Duration::days(7));
    }

    #[test]
    fn test_validation_rejects_empty_fields() {
        assert!(AuthConfig::new("", "aud").validate().is_err());
        assert!(AuthConfig::new("iss", "  ").validate().is_err());

        let config = AuthConfig::new("iss", "aud").with_signing_keys(SigningKeys::Pem {
            private_pem: String::new(),
            public_pem: String::new(),
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_nonpositive_lifetimes() {
        let config =
            AuthConfig::new("iss", "aud").with_access_token_lifetime(Duration::seconds(0));
        assert!(config.validate().is_err());

        let config = AuthConfig::new("iss", "aud").with_code_lifetime(Duration::minutes(-1));
        assert!(config.validate().is_err());
    }
}
