//! Integration tests for the `config/admin` lifecycle.
//!
//! These drive the backend through file-backed storage the way the daemon
//! does:
//! - Reading before configuration
//! - Creating, merging, and reading back the record
//! - Rejected updates leaving storage untouched
//! - Deleting and reconfiguring

use std::sync::Arc;

use artiforge_core::{
    ArtifactoryClient, Backend, BackendError, ClientError, ConnectionParams, FileStorage,
    Operation, Request, Response, Storage, TemplateContext, CONFIG_ADMIN_KEY, CONFIG_ADMIN_PATH,
};
use async_trait::async_trait;
use serde_json::{json, Value};
use tempfile::TempDir;

const TEST_TOKEN_SHA256: &str = "597480d4b62ca612193f19e73fe4cc3ad17f0bf9cfc16a7cbf4b5064131c4805";

/// Accepts only the token it was built with.
struct StaticClient {
    accepted_token: String,
}

#[async_trait]
impl ArtifactoryClient for StaticClient {
    async fn get_version(&self, conn: &ConnectionParams) -> Result<String, ClientError> {
        if conn.access_token.expose() == self.accepted_token {
            Ok("7.77.5".to_string())
        } else {
            Err(ClientError::Version {
                message: "HTTP status client error (401 Unauthorized)".to_string(),
            })
        }
    }

    async fn get_root_certificate(&self, _conn: &ConnectionParams) -> Result<String, ClientError> {
        Ok("-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----\n".to_string())
    }
}

/// Helper to create a backend over a temporary storage directory.
fn test_backend() -> (Backend, Arc<dyn Storage>, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let storage = FileStorage::new(temp_dir.path().join("storage")).unwrap();
    let backend = Backend::new(Arc::new(StaticClient {
        accepted_token: "test-access-token".to_string(),
    }));
    (backend, Arc::new(storage), temp_dir)
}

async fn send(
    backend: &Backend,
    storage: &Arc<dyn Storage>,
    op: Operation,
    data: Value,
) -> Response {
    let mut request = Request::new(op, CONFIG_ADMIN_PATH, storage.clone());
    if let Value::Object(map) = data {
        request = request.with_data(map);
    }
    backend
        .handle_request(request)
        .await
        .expect("no call-level error")
}

async fn read(backend: &Backend, storage: &Arc<dyn Storage>) -> Response {
    send(backend, storage, Operation::Read, Value::Null).await
}

async fn configure(backend: &Backend, storage: &Arc<dyn Storage>) {
    let response = send(
        backend,
        storage,
        Operation::Update,
        json!({"access_token": "test-access-token", "url": "http://myserver.com:80"}),
    )
    .await;
    assert!(!response.is_error(), "configure failed: {:?}", response.error_message());
}

#[tokio::test]
async fn test_read_before_configuration() {
    let (backend, storage, _temp) = test_backend();

    let response = read(&backend, &storage).await;
    assert_eq!(response.error_message(), Some("backend not configured"));
}

#[tokio::test]
async fn test_configure_and_read_back() {
    let (backend, storage, _temp) = test_backend();
    configure(&backend, &storage).await;

    let response = read(&backend, &storage).await;
    assert!(!response.is_error());
    assert_eq!(response.data["access_token_sha256"], TEST_TOKEN_SHA256);
    assert_eq!(response.data["url"], "http://myserver.com:80");
    assert_eq!(response.data["use_expiring_tokens"], false);
    assert_eq!(response.data["bypass_artifactory_tls_verification"], false);
    assert!(!response.data.contains_key("access_token"));
    assert!(response.warnings.is_empty());
}

#[tokio::test]
async fn test_record_is_one_entry_without_plain_view_fields() {
    let (backend, storage, temp) = test_backend();
    configure(&backend, &storage).await;

    let files: Vec<_> = std::fs::read_dir(temp.path().join("storage").join("config"))
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    assert_eq!(files, vec![std::ffi::OsString::from("admin")]);

    let entry = storage.get(CONFIG_ADMIN_KEY).await.unwrap().unwrap();
    let stored: Value = serde_json::from_slice(&entry.value).unwrap();
    assert_eq!(stored["artifactory_url"], "http://myserver.com:80");
    assert!(stored.get("access_token_sha256").is_none());
}

#[tokio::test]
async fn test_update_use_expiring_tokens() {
    let (backend, storage, _temp) = test_backend();
    configure(&backend, &storage).await;

    for (input, expected) in [(json!(true), true), (json!("false"), false), (json!("T"), true)] {
        let response = send(
            &backend,
            &storage,
            Operation::Update,
            json!({"use_expiring_tokens": input}),
        )
        .await;
        assert!(!response.is_error(), "{:?}", response.error_message());

        let response = read(&backend, &storage).await;
        assert_eq!(response.data["use_expiring_tokens"], expected);
        assert_eq!(response.data["access_token_sha256"], TEST_TOKEN_SHA256);
    }
}

#[tokio::test]
async fn test_bypass_tls_rejects_free_text() {
    let (backend, storage, _temp) = test_backend();
    configure(&backend, &storage).await;

    let response = send(
        &backend,
        &storage,
        Operation::Update,
        json!({"bypass_artifactory_tls_verification": "Sure, why not"}),
    )
    .await;

    assert_eq!(
        response.error_message(),
        Some(
            "Field validation failed: error converting input Sure, why not for field \
             \"bypass_artifactory_tls_verification\": strconv.ParseBool: parsing \
             \"Sure, why not\": invalid syntax"
        )
    );

    let response = read(&backend, &storage).await;
    assert_eq!(response.data["bypass_artifactory_tls_verification"], false);
}

#[tokio::test]
async fn test_username_template() {
    let (backend, storage, _temp) = test_backend();
    configure(&backend, &storage).await;

    let response = send(
        &backend,
        &storage,
        Operation::Update,
        json!({"username_template": "bad_{{ .somethingInvalid }_testing {{"}),
    )
    .await;
    assert!(response.error_message().unwrap().contains("username_template error"));

    let response = send(
        &backend,
        &storage,
        Operation::Update,
        json!({"username_template": "{{ .RoleName }}_{{ unix_time }}"}),
    )
    .await;
    assert!(!response.is_error(), "{:?}", response.error_message());

    let response = read(&backend, &storage).await;
    assert_eq!(response.data["username_template"], "{{ .RoleName }}_{{ unix_time }}");

    let context = TemplateContext::new().with_role_name("deployer");
    let username = backend
        .generate_username(storage.clone(), &context)
        .await
        .unwrap();
    assert!(username.starts_with("deployer_"));
}

#[tokio::test]
async fn test_first_create_requires_both_fields() {
    let (backend, storage, _temp) = test_backend();

    let response = send(
        &backend,
        &storage,
        Operation::Update,
        json!({"url": "http://myserver.com:80"}),
    )
    .await;
    assert!(response.error_message().unwrap().contains("access_token"));

    let response = send(
        &backend,
        &storage,
        Operation::Update,
        json!({"access_token": "test-access-token"}),
    )
    .await;
    assert!(response.error_message().unwrap().contains("url"));

    assert!(storage.get(CONFIG_ADMIN_KEY).await.unwrap().is_none());
}

#[tokio::test]
async fn test_bogus_token_is_stored_and_reported() {
    let (backend, storage, _temp) = test_backend();

    let response = send(
        &backend,
        &storage,
        Operation::Update,
        json!({"access_token": "bogus.token", "url": "http://myserver.com:80"}),
    )
    .await;

    assert!(response
        .error_message()
        .unwrap()
        .contains("Unable to get Artifactory Version"));
    let cause = response.cause().expect("typed cause");
    assert!(matches!(cause, BackendError::Client(_)));
    assert!(cause.to_string().contains("could not get the system version"));

    let response = read(&backend, &storage).await;
    assert!(!response.is_error());
    assert_eq!(response.warnings.len(), 1);
}

#[tokio::test]
async fn test_delete_backend_configuration() {
    let (backend, storage, _temp) = test_backend();
    configure(&backend, &storage).await;

    let response = send(&backend, &storage, Operation::Delete, Value::Null).await;
    assert!(!response.is_error());

    let response = read(&backend, &storage).await;
    assert!(response.error_message().unwrap().contains("backend not configured"));

    configure(&backend, &storage).await;
    let response = read(&backend, &storage).await;
    assert!(!response.is_error());
}

#[tokio::test]
async fn test_root_cert_cached_for_expiring_tokens() {
    let (backend, storage, _temp) = test_backend();
    configure(&backend, &storage).await;

    let response = read(&backend, &storage).await;
    assert!(!response.data.contains_key("root_cert_sha256"));

    send(
        &backend,
        &storage,
        Operation::Update,
        json!({"use_expiring_tokens": true}),
    )
    .await;
    let response = read(&backend, &storage).await;
    assert!(response.data.contains_key("root_cert_sha256"));

    // A new URL invalidates the cached certificate.
    send(
        &backend,
        &storage,
        Operation::Update,
        json!({"url": "https://artifactory.example.com", "use_expiring_tokens": false}),
    )
    .await;
    let entry = storage.get(CONFIG_ADMIN_KEY).await.unwrap().unwrap();
    let stored: Value = serde_json::from_slice(&entry.value).unwrap();
    assert_eq!(stored["artifactory_url"], "https://artifactory.example.com");
    assert!(stored.get("root_cert").is_none());

    let response = read(&backend, &storage).await;
    assert!(!response.data.contains_key("root_cert_sha256"));
}
