//! End-to-end lookup tests against a mock Consul agent

use std::time::Duration;

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use hiera_consul_backend::{BackendConfig, BackendError, ConsulBackend, ResolutionType, Scope};
use hiera_consul_client::FailurePolicy;
use serde_json::{Value, json};
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn kv_entry(key: &str, value: &str) -> Value {
    json!({
        "Key": key,
        "CreateIndex": 10,
        "ModifyIndex": 12,
        "LockIndex": 0,
        "Flags": 0,
        "Value": BASE64.encode(value),
    })
}

fn config_for(server: &MockServer, paths: &[&str]) -> BackendConfig {
    let address = server.address();
    BackendConfig::new(
        &address.ip().to_string(),
        address.port(),
        paths.iter().map(|p| p.to_string()).collect(),
    )
}

async fn mount_catalog(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v1/catalog/services"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"web": ["http"]})))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/v1/catalog/service/web"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"Node": "n1", "Address": "10.0.0.1", "ServiceID": "web-1", "ServicePort": 80},
            {"Node": "n2", "Address": "10.0.0.2", "ServiceID": "web-2", "ServicePort": 8080}
        ])))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_scalar_lookup_over_http() {
    let server = MockServer::start().await;
    mount_catalog(&server).await;
    Mock::given(method("GET"))
        .and(path("/v1/kv/configuration/web01/ntp_server"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/kv/configuration/common/ntp_server"))
        .and(query_param("token", "acl-token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([kv_entry("configuration/common/ntp_server", "pool.ntp.org")])),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut config = config_for(
        &server,
        &["/v1/kv/configuration/%{fqdn}", "/v1/kv/configuration/common"],
    );
    config.token = Some("acl-token".to_string());
    config.ignore_404 = true;
    let backend = ConsulBackend::new(&config).await.unwrap();
    let scope: Scope = [("fqdn".to_string(), "web01".to_string())].into();

    let answer = backend
        .lookup("ntp_server", &scope, None, ResolutionType::Scalar)
        .await
        .unwrap();

    assert_eq!(answer, Some(json!("pool.ntp.org")));
}

#[tokio::test]
async fn test_service_cache_answers_without_http() {
    let server = MockServer::start().await;
    mount_catalog(&server).await;
    Mock::given(method("GET"))
        .and(path("/v1/kv/configuration/common/web_ServicePort_array"))
        .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
        .expect(0)
        .mount(&server)
        .await;

    let config = config_for(&server, &["/v1/kv/configuration/common", "services"]);
    let backend = ConsulBackend::new(&config).await.unwrap();

    assert_eq!(backend.cache().get("web_Address_n2"), Some(&json!("10.0.0.2")));
    assert!(backend.cache().get("web_ServiceID").is_none());

    let answer = backend
        .lookup("web_ServicePort_array", &Scope::new(), None, ResolutionType::Array)
        .await
        .unwrap();
    assert_eq!(answer, Some(json!([80, 8080])));
}

#[tokio::test]
async fn test_catalog_lookup_returns_entries_without_token() {
    let server = MockServer::start().await;
    mount_catalog(&server).await;
    Mock::given(method("GET"))
        .and(path("/v1/catalog/service/db"))
        .and(query_param_is_missing("token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"Node": "db1", "ServiceID": "db-1", "ServiceName": "db", "ServicePort": 5432}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = config_for(&server, &["/v1/catalog/service"]);
    config.token = Some("acl-token".to_string());
    let backend = ConsulBackend::new(&config).await.unwrap();

    let answer = backend
        .lookup("db", &Scope::new(), None, ResolutionType::Scalar)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        hiera_consul_backend::consul_info(&answer, "ServicePort"),
        Some(json!([5432]))
    );
}

#[tokio::test]
async fn test_hash_lookup_with_recurse() {
    let server = MockServer::start().await;
    mount_catalog(&server).await;
    Mock::given(method("GET"))
        .and(path("/v1/kv/apps/database"))
        .and(query_param("recurse", ""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            kv_entry("apps/database/host", "db.internal"),
            kv_entry("apps/database/port", "5432")
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = config_for(&server, &["/v1/kv/apps"]);
    config.recurse = true;
    let backend = ConsulBackend::new(&config).await.unwrap();

    let answer = backend
        .lookup("database", &Scope::new(), None, ResolutionType::Hash)
        .await
        .unwrap();

    assert_eq!(
        answer,
        Some(json!({"apps/database/host": "db.internal", "apps/database/port": "5432"}))
    );
}

#[tokio::test]
async fn test_order_override_is_tried_first() {
    let server = MockServer::start().await;
    mount_catalog(&server).await;
    Mock::given(method("GET"))
        .and(path("/v1/kv/override/key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([kv_entry("override/key", "o")])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/kv/common/key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([kv_entry("common/key", "c")])))
        .expect(0)
        .mount(&server)
        .await;

    let config = config_for(&server, &["/v1/kv/common"]);
    let backend = ConsulBackend::new(&config).await.unwrap();

    let answer = backend
        .lookup("key", &Scope::new(), Some("/v1/kv/override"), ResolutionType::Scalar)
        .await
        .unwrap();
    assert_eq!(answer, Some(json!("o")));
}

#[tokio::test]
async fn test_reserved_characters_stay_in_key() {
    let server = MockServer::start().await;
    mount_catalog(&server).await;
    Mock::given(method("GET"))
        .and(path("/v1/kv/common/app"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([kv_entry("common/app", "other")])))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/kv/common/app%23v2"))
        .and(query_param("token", "acl-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([kv_entry("common/app#v2", "fragment")])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/kv/common/app%3Fx=1"))
        .and(query_param("token", "acl-token"))
        .and(query_param_is_missing("x"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([kv_entry("common/app?x=1", "query")])))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = config_for(&server, &["/v1/kv/common"]);
    config.token = Some("acl-token".to_string());
    let backend = ConsulBackend::new(&config).await.unwrap();

    let fragment = backend
        .lookup("app#v2", &Scope::new(), None, ResolutionType::Scalar)
        .await
        .unwrap();
    let query = backend
        .lookup("app?x=1", &Scope::new(), None, ResolutionType::Scalar)
        .await
        .unwrap();

    assert_eq!(fragment, Some(json!("fragment")));
    assert_eq!(query, Some(json!("query")));
}

async fn slow_then_fast(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/v1/kv/slow/key"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([kv_entry("slow/key", "late")]))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/kv/fast/key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([kv_entry("fast/key", "fast")])))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_graceful_policy_skips_failed_path() {
    let server = MockServer::start().await;
    mount_catalog(&server).await;
    slow_then_fast(&server).await;

    let mut config = config_for(&server, &["/v1/kv/slow", "/v1/kv/fast"]);
    config.http_read_timeout = 1;
    config.failure = FailurePolicy::Graceful;
    let backend = ConsulBackend::new(&config).await.unwrap();

    let answer = backend
        .lookup("key", &Scope::new(), None, ResolutionType::Scalar)
        .await
        .unwrap();
    assert_eq!(answer, Some(json!("fast")));
}

#[tokio::test]
async fn test_strict_policy_aborts_lookup() {
    let server = MockServer::start().await;
    mount_catalog(&server).await;
    slow_then_fast(&server).await;

    let mut config = config_for(&server, &["/v1/kv/slow", "/v1/kv/fast"]);
    config.http_read_timeout = 1;
    let backend = ConsulBackend::new(&config).await.unwrap();

    let result = backend
        .lookup("key", &Scope::new(), None, ResolutionType::Scalar)
        .await;
    match result {
        Err(BackendError::Transport { path, .. }) => assert_eq!(path, "/v1/kv/slow/key"),
        other => panic!("expected a transport error, got {:?}", other),
    }

    let requests = server.received_requests().await.unwrap();
    assert!(requests.iter().all(|r| r.url.path() != "/v1/kv/fast/key"));
}

#[tokio::test]
async fn test_strict_startup_fails_when_agent_is_down() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let config = BackendConfig::new("127.0.0.1", port, vec!["/v1/kv/common".to_string()]);

    let result = ConsulBackend::new(&config).await;
    assert!(matches!(result, Err(BackendError::Transport { .. })));
}

#[tokio::test]
async fn test_missing_client_cert_is_configuration_error() {
    let mut config = BackendConfig::new("127.0.0.1", 8501, vec!["/v1/kv/common".to_string()]);
    config.use_ssl = true;

    let result = ConsulBackend::new(&config).await;
    assert!(matches!(result, Err(BackendError::Configuration(_))));
}

#[tokio::test]
async fn test_unreadable_pem_is_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = BackendConfig::new("127.0.0.1", 8501, vec!["/v1/kv/common".to_string()]);
    config.use_ssl = true;
    config.ssl_cert = Some(dir.path().join("client.pem"));
    config.ssl_key = Some(dir.path().join("client.key"));

    match ConsulBackend::new(&config).await {
        Err(BackendError::Configuration(message)) => assert!(message.contains("client.pem")),
        Err(other) => panic!("unexpected error: {}", other),
        Ok(_) => panic!("expected a configuration error"),
    }
}
