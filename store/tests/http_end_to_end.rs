//! The HTTP-backed store against a mock backend

#![allow(clippy::unwrap_used)] // Tests can unwrap
#![allow(clippy::expect_used)] // Tests can expect

use backstage::{Backstage, BackstageConfig, BackstageError, Concert, ConfigError, Credentials, QueryParams, Role};
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer) -> BackstageConfig {
    BackstageConfig::default()
        .with_api_base_url(server.uri())
        .with_request_timeout(Duration::from_secs(5))
}

async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/organizer/login"))
        .and(body_json(json!({"email": "organizer@example.com", "password": "secret"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token": "jwt-7",
            "organizer": {"id_organizer": 7, "name": "Organizer", "status": "active"}
        })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn signed_in_list_sends_bearer_and_scoped_path() {
    let server = MockServer::start().await;
    mount_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/concert/organizer/7"))
        .and(query_param("page", "1"))
        .and(query_param("limit", "10"))
        .and(header("authorization", "Bearer jwt-7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id_concert": 3, "title": "Jazz Night", "status": 1}],
            "currentPage": 1,
            "totalPages": 2,
            "totalConcerts": 11
        })))
        .expect(1)
        .mount(&server)
        .await;

    let store = Backstage::from_config(&config(&server)).unwrap();
    let identity = store
        .login(Credentials::new("organizer@example.com", "secret"))
        .await
        .unwrap();
    assert_eq!(identity.role, Role::Organizer);

    store.list::<Concert>(QueryParams::default()).await.unwrap();

    let concerts = store.state(|s| s.concerts.clone()).await;
    assert_eq!(concerts.items.len(), 1);
    assert_eq!(concerts.items[0].id, "3");
    assert_eq!(concerts.page.total_pages, 2);
    assert_eq!(concerts.page.total_count, Some(11));

    store.shutdown(Duration::from_secs(1)).await.unwrap();
}

#[tokio::test]
async fn session_survives_a_restart_through_the_snapshot_directory() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    mount_login(&server).await;
    Mock::given(method("GET"))
        .and(path("/api/auth/verify"))
        .and(header("authorization", "Bearer jwt-7"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"valid": true})))
        .expect(1)
        .mount(&server)
        .await;

    let config = config(&server).with_snapshot_dir(dir.path());

    let first = Backstage::from_config(&config).unwrap();
    first
        .login(Credentials::new("organizer@example.com", "secret"))
        .await
        .unwrap();

    let second = Backstage::from_config(&config).unwrap();
    assert!(second.restore().await.unwrap());

    let session = second.state(|s| s.session.clone()).await;
    assert_eq!(session.token.as_deref(), Some("jwt-7"));
    assert_eq!(session.identity.and_then(|i| i.id).as_deref(), Some("7"));
}

#[tokio::test]
async fn unreachable_backend_is_a_network_failure() {
    let server = MockServer::start().await;
    let config = config(&server).with_api_base_url("http://127.0.0.1:9");

    let store = Backstage::from_config(&config).unwrap();
    let error = store
        .login(Credentials::new("organizer@example.com", "secret"))
        .await
        .unwrap_err();

    assert!(matches!(&error, BackstageError::Operation(info) if info.kind == backstage::FailureKind::Network));
}

#[test]
fn empty_base_url_is_rejected() {
    let config = BackstageConfig::default().with_api_base_url("  ");

    let error = Backstage::from_config(&config).err().unwrap();

    assert!(matches!(error, BackstageError::Config(ConfigError::EmptyBaseUrl)));
}
