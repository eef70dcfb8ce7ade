//! CLI handlers against a mock server with a file-backed credential store

use serde_json::json;
use std::time::Duration;
use tokenguard_cli::cli::{handlers, TokenAction};
use tokenguard_sdk::{
    ClientConfig, Credential, CredentialStore, FileCredentialStore, StoreConfig, StoreKind,
};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer, dir: &tempfile::TempDir) -> ClientConfig {
    let mut config = ClientConfig::default();
    config.http.base_url = server.uri();
    config.store = StoreConfig {
        kind: StoreKind::File,
        path: Some(dir.path().join("credential.json")),
    };
    config
}

#[tokio::test]
async fn test_burst_refreshes_persisted_credential_once() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&server, &dir);

    Mock::given(method("POST"))
        .and(path("/auth/refresh"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "access_token": "tok_2" }))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(header("Authorization", "Bearer tok_1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(header("Authorization", "Bearer tok_2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(3)
        .mount(&server)
        .await;

    handlers::token::handle_token(
        &config,
        TokenAction::Set {
            value: "tok_1".to_string(),
        },
    )
    .await
    .unwrap();

    let paths = vec![
        "/orders".to_string(),
        "/profile".to_string(),
        "/cart".to_string(),
    ];
    handlers::request::handle_burst(&config, &paths).await.unwrap();

    let store = FileCredentialStore::new(dir.path().join("credential.json"));
    assert_eq!(store.get().await.unwrap(), Some(Credential::new("tok_2")));
}

#[tokio::test]
async fn test_logout_clears_persisted_credential() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&server, &dir);

    Mock::given(method("POST"))
        .and(path("/auth/logout"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let store = FileCredentialStore::new(dir.path().join("credential.json"));
    store.set(Credential::new("tok_1")).await.unwrap();

    handlers::session::handle_logout(&config).await.unwrap();

    assert_eq!(store.get().await.unwrap(), None);
}

#[tokio::test]
async fn test_send_rejects_invalid_body() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&server, &dir);

    let result =
        handlers::request::handle_send(&config, "POST", "/orders", Some("{not json")).await;
    assert!(matches!(
        result,
        Err(tokenguard_cli::CliError::InvalidArgument(_))
    ));
}
