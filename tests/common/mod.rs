#![allow(dead_code)]

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, Response, header},
};
use chrono::Utc;
use jsonwebtoken::{EncodingKey, Header, encode};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;
use wadash::{
    AppState,
    billing::StripeClient,
    build_router,
    config::Config,
    gateway::HttpGatewayClient,
    models::{Organization, Role, User},
    store::MemoryStore,
};

pub const JWT_SECRET: &str = "test-jwt-secret";
pub const GATEWAY_SECRET: &str = "THISISMYSECURETOKEN";

pub fn config(gateway_url: &str) -> Config {
    Config {
        database_url: "postgres://localhost/unused".into(),
        redis_url: None,
        jwt_secret: JWT_SECRET.into(),
        jwt_audience: "authenticated".into(),
        rate_limit_window_secs: 60,
        rate_limit_requests: 100,
        trust_proxy_headers: false,
        server_host: "127.0.0.1".into(),
        server_port: 0,
        api_base_uri: "/api".into(),
        gateway_base_url: gateway_url.into(),
        gateway_secret_key: GATEWAY_SECRET.into(),
        gateway_timeout_secs: 5,
        session_poll_interval_secs: 1,
        stripe_secret_key: None,
        stripe_api_base: gateway_url.into(),
        portal_return_url: Some("https://app.example.com/billing".into()),
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
}

pub fn app(config: Config, store: Arc<MemoryStore>) -> TestApp {
    let gateway = HttpGatewayClient::new(
        &config.gateway_base_url,
        &config.gateway_secret_key,
        config.gateway_timeout(),
    )
    .unwrap();
    let billing = config.stripe_secret_key.as_deref().map(|key| {
        StripeClient::new(&config.stripe_api_base, key, config.gateway_timeout()).unwrap()
    });
    let state = AppState {
        config,
        store: store.clone(),
        gateway: Arc::new(gateway),
        billing,
    };
    TestApp {
        router: build_router(state, None),
        store,
    }
}

pub fn token_for(user_id: Uuid) -> String {
    let claims = json!({
        "sub": user_id.to_string(),
        "exp": Utc::now().timestamp() + 3600,
        "aud": "authenticated",
        "email": "owner@example.com",
    });
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .unwrap()
}

pub fn user(role: Role, organization_id: Option<Uuid>) -> User {
    User {
        id: Uuid::new_v4(),
        email: "owner@example.com".into(),
        role,
        organization_id,
        unsubscribed_from_reminders: false,
    }
}

pub fn organization(name: &str) -> Organization {
    Organization {
        id: Uuid::new_v4(),
        name: name.into(),
        is_legacy: false,
        stripe_customer_id: None,
        created_at: Utc::now(),
    }
}

/// 建一个组织和它的管理员
pub async fn seed_tenant(store: &MemoryStore, org_name: &str) -> (User, Organization) {
    let org = organization(org_name);
    let admin = user(Role::Admin, Some(org.id));
    store.insert_organization(org.clone()).await;
    store.insert_user(admin.clone()).await;
    (admin, org)
}

pub async fn send(
    router: &Router,
    method: &str,
    uri: &str,
    bearer: Option<&str>,
    body: Option<Value>,
) -> Response<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = bearer {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let body = match body {
        Some(json) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    router
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap()
}

pub async fn json_body(response: Response<Body>) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}
