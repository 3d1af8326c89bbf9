use std::time::Duration;

use serde_json::json;
use wadash::gateway::{GatewayApi, GatewayError, HttpGatewayClient};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{header, method, path},
};

fn client(server: &MockServer) -> HttpGatewayClient {
    HttpGatewayClient::new(&format!("{}/", server.uri()), "s3cret", Duration::from_secs(5))
        .unwrap()
}

#[tokio::test]
async fn plain_text_error_body_becomes_message() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/acme/check-connection-session"))
        .respond_with(ResponseTemplate::new(503).set_body_string("gateway restarting"))
        .mount(&server)
        .await;

    let err = client(&server)
        .check_connection("acme", "tok")
        .await
        .unwrap_err();

    match err {
        GatewayError::Upstream { status, message } => {
            assert_eq!(status, 503);
            assert_eq!(message, "gateway restarting");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn logout_sends_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/acme/logout-session"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "status": true, "message": "Session successfully closed" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    client(&server).logout_session("acme", "tok").await.unwrap();
}

#[tokio::test]
async fn unreachable_gateway_is_a_transport_error() {
    let client =
        HttpGatewayClient::new("http://127.0.0.1:9", "s3cret", Duration::from_secs(2)).unwrap();

    let err = client.generate_token("acme").await.unwrap_err();

    assert!(matches!(err, GatewayError::Transport(_)));
    assert_eq!(err.upstream_status(), None);
}
