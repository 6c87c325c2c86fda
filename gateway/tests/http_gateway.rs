//! HTTP gateway tests against a mock server

#![allow(clippy::unwrap_used, clippy::expect_used)]

use backstage_gateway::{
    ErrorKind, FileAttachment, Gateway, HttpTransport, LoginRedirect, MemorySnapshotStore,
    Payload, Request,
};
use serde_json::json;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, header, header_regex, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Default)]
struct FlagRedirect(AtomicBool);

impl LoginRedirect for FlagRedirect {
    fn redirect_to_login(&self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

fn gateway(server: &MockServer) -> (Gateway<HttpTransport>, Arc<FlagRedirect>) {
    let transport = HttpTransport::new(server.uri(), Duration::from_secs(5)).unwrap();
    let redirect = Arc::new(FlagRedirect::default());
    let gateway = Gateway::new(transport, Arc::new(MemorySnapshotStore::new()))
        .with_redirect(redirect.clone());
    (gateway, redirect)
}

#[tokio::test]
async fn list_request_carries_query_and_bearer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/concert"))
        .and(query_param("page", "2"))
        .and(query_param("limit", "10"))
        .and(header("authorization", "Bearer abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"id": 1, "title": "Jazz Night"}],
            "currentPage": 2,
            "totalPages": 4
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (gateway, _) = gateway(&server);
    gateway.persist_session("abc", &json!({"id": 9})).unwrap();

    let body = gateway
        .send(Request::get("/api/concert").query("page", 2).query("limit", 10))
        .await
        .unwrap();

    assert_eq!(body["data"][0]["title"], "Jazz Night");
}

#[tokio::test]
async fn json_payload_is_sent_as_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/transaction/confirm"))
        .and(body_json(json!({"id_transaction": "12", "transaction_status": "approved"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"message": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    let (gateway, _) = gateway(&server);
    let payload = Payload::new()
        .field("id_transaction", "12")
        .field("transaction_status", "approved");

    gateway
        .send(Request::post("/api/transaction/confirm").payload(payload))
        .await
        .unwrap();
}

#[tokio::test]
async fn file_payload_is_sent_as_multipart() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/concert/create"))
        .and(header_regex("content-type", "^multipart/form-data"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"data": {"id": 5}})))
        .expect(1)
        .mount(&server)
        .await;

    let (gateway, _) = gateway(&server);
    let payload = Payload::new()
        .field("title", "Poster Show")
        .field("price", 75_000)
        .file("image", FileAttachment::new("poster.jpg", "image/jpeg", vec![0xFF, 0xD8]));

    let body = gateway
        .send(Request::post("/api/concert/create").payload(payload))
        .await
        .unwrap();
    assert_eq!(body["data"]["id"], 5);
}

#[tokio::test]
async fn unauthorized_response_forces_logout_side_effect() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/order"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"message": "Token invalid"})))
        .mount(&server)
        .await;

    let (gateway, redirect) = gateway(&server);
    gateway.persist_session("expired", &json!({"id": 1})).unwrap();

    let err = gateway.send(Request::get("/api/order")).await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::Auth);
    assert_eq!(err.status, Some(401));
    assert!(redirect.0.load(Ordering::SeqCst));
    assert!(gateway.stored_token().is_none());
}

#[tokio::test]
async fn client_error_keeps_server_message_and_code() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/organizers/3"))
        .respond_with(ResponseTemplate::new(409).set_body_json(json!({
            "message": "Email already used",
            "code": "EMAIL_TAKEN"
        })))
        .mount(&server)
        .await;

    let (gateway, redirect) = gateway(&server);
    let err = gateway
        .send(Request::put("/api/organizers/3").json(json!({"email": "a@b.c"})))
        .await
        .unwrap_err();

    assert_eq!(err.kind, ErrorKind::Client);
    assert_eq!(err.message, "Email already used");
    assert_eq!(err.code.as_deref(), Some("EMAIL_TAKEN"));
    assert!(!redirect.0.load(Ordering::SeqCst));
}

#[tokio::test]
async fn server_error_is_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/transaction"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let (gateway, _) = gateway(&server);
    let err = gateway.send(Request::get("/api/transaction")).await.unwrap_err();

    assert_eq!(err.kind, ErrorKind::Server);
    assert_eq!(err.status, Some(503));
}

#[tokio::test]
async fn unreachable_host_is_network_error() {
    let transport = HttpTransport::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
    let gateway = Gateway::new(transport, Arc::new(MemorySnapshotStore::new()));

    let err = gateway.send(Request::get("/api/concert")).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Network);
}
