mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use base64::{Engine, engine::general_purpose::STANDARD};
use serde_json::json;
use uuid::Uuid;
use wadash::{
    models::Role,
    store::{MemoryStore, UserRepository},
};

use common::{app, config, json_body, send, user};

async fn setup() -> (common::TestApp, Uuid) {
    let store = Arc::new(MemoryStore::new());
    let member = user(Role::User, None);
    store.insert_user(member.clone()).await;
    (app(config("http://127.0.0.1:9"), store), member.id)
}

async fn is_unsubscribed(store: &MemoryStore, id: Uuid) -> bool {
    store
        .find_user(id)
        .await
        .unwrap()
        .unwrap()
        .unsubscribed_from_reminders
}

#[tokio::test]
async fn query_token_unsubscribes_idempotently() {
    let (app, user_id) = setup().await;
    let token = STANDARD.encode(user_id.to_string());
    // '+' 和 '/' 需要转义
    let uri = format!(
        "/api/functions/unsubscribe?token={}",
        token.replace('+', "%2B").replace('/', "%2F").replace('=', "%3D")
    );

    for _ in 0..2 {
        let response = send(&app.router, "GET", &uri, None, None).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["success"], true);
        assert!(body["message"].as_str().unwrap().contains("lembretes"));
    }
    assert!(is_unsubscribed(&app.store, user_id).await);
}

#[tokio::test]
async fn body_token_is_used_when_query_is_absent() {
    let (app, user_id) = setup().await;
    let token = STANDARD.encode(user_id.to_string());

    let response = send(
        &app.router,
        "POST",
        "/api/functions/unsubscribe",
        None,
        Some(json!({ "token": token })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(is_unsubscribed(&app.store, user_id).await);
}

#[tokio::test]
async fn query_token_takes_precedence_over_body() {
    let (app, user_id) = setup().await;
    let other = Uuid::new_v4();
    let query_token = STANDARD.encode(other.to_string());
    let body_token = STANDARD.encode(user_id.to_string());

    let response = send(
        &app.router,
        "POST",
        &format!(
            "/api/functions/unsubscribe?token={}",
            query_token.replace('+', "%2B").replace('/', "%2F").replace('=', "%3D")
        ),
        None,
        Some(json!({ "token": body_token })),
    )
    .await;

    // 查询串里的用户不存在
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert!(!is_unsubscribed(&app.store, user_id).await);
}

#[tokio::test]
async fn malformed_tokens_are_rejected_without_mutation() {
    let (app, user_id) = setup().await;
    let not_uuid = STANDARD.encode("definitely-not-a-user");

    for token in ["%%%not-base64%%%", not_uuid.as_str()] {
        let response = send(
            &app.router,
            "POST",
            "/api/functions/unsubscribe",
            None,
            Some(json!({ "token": token })),
        )
        .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert!(body["error"].is_string());
    }
    assert!(!is_unsubscribed(&app.store, user_id).await);
}

#[tokio::test]
async fn repeated_query_token_is_a_json_bad_request() {
    let (app, user_id) = setup().await;
    let token = STANDARD
        .encode(user_id.to_string())
        .replace('+', "%2B")
        .replace('/', "%2F")
        .replace('=', "%3D");

    let response = send(
        &app.router,
        "GET",
        &format!("/api/functions/unsubscribe?token={token}&token={token}"),
        None,
        None,
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        response.headers()[axum::http::header::CONTENT_TYPE],
        "application/json"
    );
    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "invalid query string");
    assert!(!is_unsubscribed(&app.store, user_id).await);
}

#[tokio::test]
async fn missing_token_is_a_bad_request() {
    let (app, _) = setup().await;

    let response = send(&app.router, "GET", "/api/functions/unsubscribe", None, None).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(json_body(response).await["error"], "token is required");
}

#[tokio::test]
async fn store_outage_is_a_server_error() {
    let (app, user_id) = setup().await;
    app.store.set_unavailable(true);

    let response = send(
        &app.router,
        "POST",
        "/api/functions/unsubscribe",
        None,
        Some(json!({ "token": STANDARD.encode(user_id.to_string()) })),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(response).await["error"], "internal server error");
}
