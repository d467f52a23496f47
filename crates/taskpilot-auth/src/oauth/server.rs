//! Authorization server orchestrator.
//!
//! [`AuthorizationServer`] ties the pieces together: client registration,
//! session login, the authorization code flow with PKCE, the token
//! endpoint with refresh rotation, and access token verification. It
//! holds no I/O of its own; storages and the JWT service are injected.
//!
//! Token values, codes, and passwords never appear in log output.

use std::sync::Arc;

use crate::AuthResult;
use crate::config::{AuthConfig, SigningKeys};
use crate::error::AuthError;
use crate::oauth::pkce::{PkceChallenge, PkceChallengeMethod, PkceVerifier};
use crate::oauth::token::TokenResponse;
use crate::storage::{
    AuthorizationCodeStorage, ClientStorage, RefreshTokenStorage, SessionStorage,
};
use crate::token::{IssueParams, JwtService, SigningKeyPair, TokenVerification};
use crate::types::authorization_code::AuthorizationCode;
use crate::types::client::{Client, ClientMetadata, RegisteredClient, build_client};
use crate::types::refresh_token::RefreshToken;
use crate::types::session::UserSession;
use crate::types::user::UserDirectory;

/// Builds the JWT service described by a validated configuration.
///
/// # Errors
///
/// Returns an error if key generation fails or the configured PEM
/// material is invalid.
pub fn build_jwt_service(config: &AuthConfig) -> AuthResult<JwtService> {
    let key_pair = match &config.signing_keys {
        SigningKeys::Generate => SigningKeyPair::generate()
            .map_err(|e| AuthError::configuration(format!("key generation failed: {e}")))?,
        SigningKeys::Pem {
            private_pem,
            public_pem,
        } => SigningKeyPair::from_pem(private_pem, public_pem)
            .map_err(|e| AuthError::configuration(format!("invalid signing keys: {e}")))?,
    };
    Ok(JwtService::new(
        key_pair,
        config.issuer.clone(),
        config.access_token_lifetime.whole_seconds(),
    ))
}

// =============================================================================
// Request types
// =============================================================================

/// An authorization request approved by a logged-in user.
#[derive(Debug, Clone)]
pub struct AuthorizationRequest {
    /// Requesting client.
    pub client_id: String,
    /// Redirect URI the client supplied; must match a registered URI
    /// exactly.
    pub redirect_uri: String,
    /// Requested scopes (space-separated).
    pub scope: String,
    /// PKCE code challenge.
    pub code_challenge: String,
    /// PKCE challenge method; only "S256" is accepted.
    pub code_challenge_method: String,
    /// Opaque client state, echoed back on the redirect.
    pub state: Option<String>,
}

/// Result of a completed authorization: what the redirect carries.
#[derive(Debug, Clone)]
pub struct CompletedAuthorization {
    /// The single-use authorization code.
    pub code: String,
    /// The client's state parameter, passed through untouched.
    pub state: Option<String>,
}

/// A token request using the `authorization_code` grant.
#[derive(Debug, Clone)]
pub struct CodeExchangeRequest {
    /// The authorization code being redeemed.
    pub code: String,
    /// Client presenting the code.
    pub client_id: String,
    /// Confidential client secret, if any.
    pub client_secret: Option<String>,
    /// Must equal the redirect URI from the authorization request.
    pub redirect_uri: String,
    /// PKCE code verifier.
    pub code_verifier: String,
}

// =============================================================================
// AuthorizationServer
// =============================================================================

/// The embedded OAuth 2.0 authorization server.
///
/// Thread-safe; wrap in an `Arc` and share across tasks.
pub struct AuthorizationServer {
    clients: Arc<dyn ClientStorage>,
    codes: Arc<dyn AuthorizationCodeStorage>,
    refresh_tokens: Arc<dyn RefreshTokenStorage>,
    sessions: Arc<dyn SessionStorage>,
    jwt: Arc<JwtService>,
    users: UserDirectory,
    config: AuthConfig,
}

impl AuthorizationServer {
    /// Creates the server from its parts.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Configuration` if `config` fails validation.
    pub fn new(
        clients: Arc<dyn ClientStorage>,
        codes: Arc<dyn AuthorizationCodeStorage>,
        refresh_tokens: Arc<dyn RefreshTokenStorage>,
        sessions: Arc<dyn SessionStorage>,
        jwt: Arc<JwtService>,
        users: UserDirectory,
        config: AuthConfig,
    ) -> AuthResult<Self> {
        config.validate()?;
        Ok(Self {
            clients,
            codes,
            refresh_tokens,
            sessions,
            jwt,
            users,
            config,
        })
    }

    /// Returns the JWT service, for hosts that expose the public key.
    #[must_use]
    pub fn jwt(&self) -> &Arc<JwtService> {
        &self.jwt
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    // -------------------------------------------------------------------------
    // Client registration
    // -------------------------------------------------------------------------

    /// Registers a new OAuth client.
    ///
    /// Confidential clients receive a generated secret in the result;
    /// it is shown once and only its Argon2id hash is stored.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidRequest` for bad metadata or a storage
    /// error.
    pub async fn register_client(&self, metadata: ClientMetadata) -> AuthResult<RegisteredClient> {
        metadata.validate()?;
        let registered = build_client(&metadata)?;
        self.clients.create(&registered.client).await?;
        tracing::info!(
            client_id = %registered.client.client_id,
            client_type = %registered.client.client_type,
            "registered OAuth client"
        );
        Ok(registered)
    }

    /// Looks up a registered client.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    pub async fn get_client(&self, client_id: &str) -> AuthResult<Option<Client>> {
        self.clients.find_by_client_id(client_id).await
    }

    /// Deletes a client registration and revokes its refresh tokens.
    ///
    /// Returns `true` if a client was removed. Outstanding access tokens
    /// stay valid until `exp`; they are stateless.
    ///
    /// # Errors
    ///
    /// Returns an error if a storage operation fails.
    pub async fn delete_client(&self, client_id: &str) -> AuthResult<bool> {
        let deleted = self.clients.delete(client_id).await?;
        if deleted {
            let revoked = self.refresh_tokens.revoke_by_client(client_id).await?;
            tracing::info!(client_id = %client_id, revoked, "deleted OAuth client");
        }
        Ok(deleted)
    }

    // -------------------------------------------------------------------------
    // Sessions
    // -------------------------------------------------------------------------

    /// Authenticates a user with username and password, creating a
    /// session on success.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::AccessDenied` for unknown usernames and wrong
    /// passwords alike.
    pub async fn authenticate_user(
        &self,
        username: &str,
        password: &str,
    ) -> AuthResult<UserSession> {
        let user = self
            .users
            .verify(username, password)
            .ok_or_else(|| AuthError::access_denied("invalid username or password"))?;

        let session = UserSession::new(
            user.id.clone(),
            user.username.clone(),
            self.config.session_lifetime,
        );
        self.sessions.create(&session).await?;
        tracing::info!(user_id = %session.user_id, "user logged in");
        Ok(session)
    }

    /// Resolves a session identifier to a live session.
    ///
    /// Expired sessions are removed as a side effect.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::AccessDenied` if the session is unknown or
    /// expired.
    pub async fn validate_session(&self, session_id: &str) -> AuthResult<UserSession> {
        let session = self
            .sessions
            .find(session_id)
            .await?
            .ok_or_else(|| AuthError::access_denied("unknown session"))?;

        if session.is_expired() {
            self.sessions.delete(session_id).await?;
            return Err(AuthError::access_denied("session expired"));
        }
        Ok(session)
    }

    /// Ends a session.
    ///
    /// Returns `true` if a session was removed.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    pub async fn logout(&self, session_id: &str) -> AuthResult<bool> {
        let removed = self.sessions.delete(session_id).await?;
        if removed {
            tracing::debug!("session ended");
        }
        Ok(removed)
    }

    // -------------------------------------------------------------------------
    // Authorization code flow
    // -------------------------------------------------------------------------

    /// Completes an authorization the given user has approved, issuing a
    /// single-use code.
    ///
    /// The caller is responsible for having authenticated the user (via
    /// [`Self::validate_session`]) before calling this.
    ///
    /// # Errors
    ///
    /// - `AuthError::InvalidClient` for an unknown client
    /// - `AuthError::InvalidRequest` for a redirect URI that is not
    ///   registered, or a malformed/unsupported PKCE challenge
    /// - `AuthError::InvalidScope` for scopes outside the client's grant
    pub async fn complete_authorization(
        &self,
        request: AuthorizationRequest,
        user_id: &str,
    ) -> AuthResult<CompletedAuthorization> {
        let client = self
            .clients
            .find_by_client_id(&request.client_id)
            .await?
            .ok_or_else(|| AuthError::invalid_client("unknown client"))?;

        if !client.validate_redirect_uri(&request.redirect_uri) {
            return Err(AuthError::invalid_request("redirect_uri is not registered"));
        }
        if !client.allows_scope(&request.scope) {
            return Err(AuthError::invalid_scope(format!(
                "client may not request: {}",
                request.scope
            )));
        }

        PkceChallengeMethod::parse(&request.code_challenge_method)
            .map_err(|e| AuthError::invalid_request(e.to_string()))?;
        let challenge = PkceChallenge::new(request.code_challenge)
            .map_err(|e| AuthError::invalid_request(e.to_string()))?;

        let now = time::OffsetDateTime::now_utc();
        let code = AuthorizationCode {
            code: AuthorizationCode::generate_code(),
            client_id: client.client_id.clone(),
            user_id: user_id.to_string(),
            redirect_uri: request.redirect_uri,
            scope: request.scope,
            code_challenge: challenge.into_inner(),
            created_at: now,
            expires_at: now + self.config.code_lifetime,
            consumed_at: None,
        };
        self.codes.create(&code).await?;

        tracing::debug!(client_id = %client.client_id, "issued authorization code");
        Ok(CompletedAuthorization {
            code: code.code,
            state: request.state,
        })
    }

    /// Exchanges an authorization code for tokens.
    ///
    /// The code is consumed before any other check, so a request that
    /// fails PKCE or redirect validation still burns it.
    ///
    /// # Errors
    ///
    /// - `AuthError::InvalidGrant` for an unknown, expired, consumed, or
    ///   mismatched code
    /// - `AuthError::InvalidClient` if client authentication fails
    /// - `AuthError::PkceVerificationFailed` on verifier mismatch
    pub async fn exchange_code(&self, request: CodeExchangeRequest) -> AuthResult<TokenResponse> {
        let record = self.codes.consume(&request.code).await?;

        if record.client_id != request.client_id {
            return Err(AuthError::invalid_grant(
                "code was issued to a different client",
            ));
        }
        if record.redirect_uri != request.redirect_uri {
            return Err(AuthError::invalid_grant("redirect_uri mismatch"));
        }

        self.authenticate_client(&request.client_id, request.client_secret.as_deref())
            .await?;

        let verifier = PkceVerifier::new(request.code_verifier)
            .map_err(|e| AuthError::invalid_request(e.to_string()))?;
        let challenge = PkceChallenge::new(record.code_challenge.clone())
            .map_err(|e| AuthError::internal(e.to_string()))?;
        challenge
            .verify(&verifier)
            .map_err(|_| AuthError::PkceVerificationFailed)?;

        let response = self
            .issue_tokens(&record.client_id, &record.user_id, &record.scope)
            .await?;
        tracing::info!(client_id = %record.client_id, "exchanged authorization code");
        Ok(response)
    }

    /// Exchanges a refresh token, rotating it.
    ///
    /// The presented token stops working whether or not the exchange
    /// succeeds past rotation; the response carries its replacement. The
    /// replacement keeps the original expiry, so refreshing never
    /// extends the grant.
    ///
    /// # Errors
    ///
    /// - `AuthError::InvalidGrant` for an unknown, rotated, expired, or
    ///   mismatched token
    /// - `AuthError::InvalidClient` if client authentication fails
    pub async fn exchange_refresh_token(
        &self,
        refresh_token: &str,
        client_id: &str,
        client_secret: Option<&str>,
    ) -> AuthResult<TokenResponse> {
        self.authenticate_client(client_id, client_secret).await?;

        let old_hash = RefreshToken::hash_token(refresh_token);
        let record = self
            .refresh_tokens
            .find_by_hash(&old_hash)
            .await?
            .ok_or_else(|| AuthError::invalid_grant("unknown or rotated refresh token"))?;

        if record.client_id != client_id {
            return Err(AuthError::invalid_grant(
                "refresh token was issued to a different client",
            ));
        }
        if record.is_expired() {
            self.refresh_tokens.revoke(&old_hash).await?;
            return Err(AuthError::invalid_grant("refresh token expired"));
        }

        // rotate() is the atomic step; a concurrent exchange of the same
        // token loses here with invalid_grant
        let (replacement, plaintext) = record.rotated();
        let old = self.refresh_tokens.rotate(&old_hash, &replacement).await?;

        let issued = self.jwt.issue(IssueParams {
            client_id: old.client_id.clone(),
            user_id: old.user_id.clone(),
            scope: old.scope.clone(),
            audience: self.config.audience.clone(),
        })?;

        tracing::info!(client_id = %old.client_id, "rotated refresh token");
        Ok(TokenResponse {
            access_token: issued.access_token,
            token_type: "Bearer".to_string(),
            expires_in: issued.expires_in,
            refresh_token: Some(plaintext),
            scope: Some(old.scope),
        })
    }

    // -------------------------------------------------------------------------
    // Tokens
    // -------------------------------------------------------------------------

    /// Verifies an access token against this server's key and audience.
    #[must_use]
    pub fn verify_access_token(&self, token: &str) -> TokenVerification {
        self.jwt.verify(token, Some(&self.config.audience))
    }

    /// Revokes all refresh tokens issued to a client.
    ///
    /// Returns the number of tokens removed. Outstanding access tokens
    /// run out their `exp`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    pub async fn revoke_tokens(&self, client_id: &str) -> AuthResult<usize> {
        let revoked = self.refresh_tokens.revoke_by_client(client_id).await?;
        tracing::info!(client_id = %client_id, revoked, "revoked refresh tokens");
        Ok(revoked)
    }

    /// Sweeps expired codes, refresh tokens, and sessions from all
    /// stores.
    ///
    /// # Errors
    ///
    /// Returns an error if a storage operation fails.
    pub async fn cleanup_expired(&self) -> AuthResult<()> {
        let codes = self.codes.cleanup_expired().await?;
        let tokens = self.refresh_tokens.cleanup_expired().await?;
        let sessions = self.sessions.cleanup_expired().await?;
        tracing::debug!(codes, tokens, sessions, "swept expired records");
        Ok(())
    }

    /// Flushes and shuts down every storage backend.
    ///
    /// After this returns, all acknowledged mutations are durable.
    ///
    /// # Errors
    ///
    /// Returns the first storage shutdown error encountered.
    pub async fn shutdown(&self) -> AuthResult<()> {
        self.clients.shutdown().await?;
        self.refresh_tokens.shutdown().await?;
        self.sessions.shutdown().await?;
        tracing::info!("authorization server shut down");
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Internals
    // -------------------------------------------------------------------------

    /// Authenticates the client for a token request.
    ///
    /// Public clients pass without a secret (PKCE is their proof);
    /// confidential clients must present their secret.
    async fn authenticate_client(
        &self,
        client_id: &str,
        client_secret: Option<&str>,
    ) -> AuthResult<Client> {
        let client = self
            .clients
            .find_by_client_id(client_id)
            .await?
            .ok_or_else(|| AuthError::invalid_client("unknown client"))?;

        if client.is_confidential() {
            let secret = client_secret
                .ok_or_else(|| AuthError::invalid_client("client secret required"))?;
            if !client.verify_secret(secret) {
                return Err(AuthError::invalid_client("client authentication failed"));
            }
        }
        Ok(client)
    }

    /// Issues the access token plus a fresh refresh token.
    async fn issue_tokens(
        &self,
        client_id: &str,
        user_id: &str,
        scope: &str,
    ) -> AuthResult<TokenResponse> {
        let issued = self.jwt.issue(IssueParams {
            client_id: client_id.to_string(),
            user_id: user_id.to_string(),
            scope: scope.to_string(),
            audience: self.config.audience.clone(),
        })?;

        let plaintext = RefreshToken::generate_token();
        let now = time::OffsetDateTime::now_utc();
        let record = RefreshToken {
            id: uuid::Uuid::new_v4(),
            token_hash: RefreshToken::hash_token(&plaintext),
            client_id: client_id.to_string(),
            user_id: user_id.to_string(),
            scope: scope.to_string(),
            created_at: now,
            expires_at: now + self.config.refresh_token_lifetime,
        };
        self.refresh_tokens.create(&record).await?;

        Ok(TokenResponse {
            access_token: issued.access_token,
            token_type: "Bearer".to_string(),
            expires_in: issued.expires_in,
            refresh_token: Some(plaintext),
            scope: Some(scope.to_string()),
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
