//! Full authorization flow over the file backend, across a simulated
//! restart.

use std::path::Path;
use std::sync::Arc;

use taskpilot_auth::{
    AuthConfig, AuthorizationRequest, AuthorizationServer, CodeExchangeRequest,
    ClientMetadata, ClientType, InMemoryAuthorizationCodeStore, PkceChallenge, PkceVerifier,
    SigningKeys, UserDirectory, build_jwt_service,
};
use taskpilot_auth_file::{FileAuthStores, KeySource};

fn users() -> UserDirectory {
    UserDirectory::new()
        .with_password("user-1", "alice", "correct horse")
        .unwrap()
}

fn boot(base: &Path, store_key: [u8; 32], signing_keys: SigningKeys) -> AuthorizationServer {
    let config = AuthConfig::new("https://auth.taskpilot.local", "taskpilot-mcp")
        .with_signing_keys(signing_keys);
    let jwt = Arc::new(build_jwt_service(&config).unwrap());
    let stores = FileAuthStores::open(base, KeySource::Provided(store_key)).unwrap();

    AuthorizationServer::new(
        stores.clients,
        Arc::new(InMemoryAuthorizationCodeStore::new()),
        stores.refresh_tokens,
        stores.sessions,
        jwt,
        users(),
        config,
    )
    .unwrap()
}

#[tokio::test]
async fn full_flow_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let store_key = taskpilot_auth_file::EncryptionService::generate_key();

    // first boot: generated signing keys, exported for the next boot
    let server = boot(dir.path(), store_key, SigningKeys::Generate);
    let (private_pem, public_pem) = {
        let (private_pem, public_pem) = server.jwt().signing_key().to_pem();
        (private_pem.to_string(), public_pem.to_string())
    };

    // register, log in, authorize, exchange
    let registered = server
        .register_client(ClientMetadata {
            client_name: "Task Frontend".to_string(),
            redirect_uris: vec!["http://localhost:3000/callback".to_string()],
            client_type: ClientType::Public,
            scopes: vec![],
        })
        .await
        .unwrap();
    let client_id = registered.client.client_id.clone();

    let session = server.authenticate_user("alice", "correct horse").await.unwrap();
    let user = server.validate_session(&session.id).await.unwrap();

    let verifier = PkceVerifier::generate();
    let challenge = PkceChallenge::from_verifier(&verifier);
    let completed = server
        .complete_authorization(
            AuthorizationRequest {
                client_id: client_id.clone(),
                redirect_uri: "http://localhost:3000/callback".to_string(),
                scope: "tasks:read tasks:write".to_string(),
                code_challenge: challenge.as_str().to_string(),
                code_challenge_method: "S256".to_string(),
                state: None,
            },
            &user.user_id,
        )
        .await
        .unwrap();

    let response = server
        .exchange_code(CodeExchangeRequest {
            code: completed.code,
            client_id: client_id.clone(),
            client_secret: None,
            redirect_uri: "http://localhost:3000/callback".to_string(),
            code_verifier: verifier.as_str().to_string(),
        })
        .await
        .unwrap();
    let access_token = response.access_token.clone();
    let refresh_token = response.refresh_token.clone().unwrap();

    assert!(server.verify_access_token(&access_token).is_valid());
    server.shutdown().await.unwrap();

    // second boot: same store key, signing keys loaded from PEM
    let server = boot(
        dir.path(),
        store_key,
        SigningKeys::Pem {
            private_pem,
            public_pem,
        },
    );

    // client, session, and access token all survived
    assert!(server.get_client(&client_id).await.unwrap().is_some());
    assert_eq!(
        server.validate_session(&session.id).await.unwrap().user_id,
        "user-1"
    );
    let claims = server.verify_access_token(&access_token);
    assert_eq!(claims.claims().unwrap().client_id, client_id);

    // refresh rotation works after restart, and burns the old token
    let rotated = server
        .exchange_refresh_token(&refresh_token, &client_id, None)
        .await
        .unwrap();
    assert!(server.verify_access_token(&rotated.access_token).is_valid());
    let err = server
        .exchange_refresh_token(&refresh_token, &client_id, None)
        .await
        .unwrap_err();
    assert_eq!(err.oauth_error_code(), "invalid_grant");

    server.shutdown().await.unwrap();
}

#[tokio::test]
async fn authorization_codes_do_not_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let store_key = taskpilot_auth_file::EncryptionService::generate_key();

    let server = boot(dir.path(), store_key, SigningKeys::Generate);
    let registered = server
        .register_client(ClientMetadata {
            client_name: "Task Frontend".to_string(),
            redirect_uris: vec!["http://localhost:3000/callback".to_string()],
            client_type: ClientType::Public,
            scopes: vec![],
        })
        .await
        .unwrap();
    let client_id = registered.client.client_id.clone();

    let verifier = PkceVerifier::generate();
    let challenge = PkceChallenge::from_verifier(&verifier);
    let completed = server
        .complete_authorization(
            AuthorizationRequest {
                client_id: client_id.clone(),
                redirect_uri: "http://localhost:3000/callback".to_string(),
                scope: "tasks:read".to_string(),
                code_challenge: challenge.as_str().to_string(),
                code_challenge_method: "S256".to_string(),
                state: None,
            },
            "user-1",
        )
        .await
        .unwrap();
    server.shutdown().await.unwrap();

    let server = boot(dir.path(), store_key, SigningKeys::Generate);
    let err = server
        .exchange_code(CodeExchangeRequest {
            code: completed.code,
            client_id,
            client_secret: None,
            redirect_uri: "http://localhost:3000/callback".to_string(),
            code_verifier: verifier.as_str().to_string(),
        })
        .await
        .unwrap_err();
    assert_eq!(err.oauth_error_code(), "invalid_grant");
    server.shutdown().await.unwrap();
}
