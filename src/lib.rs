use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use billing::StripeClient;
use config::Config;
use gateway::GatewayApi;
use middleware::{RateLimiter, auth_middleware, log_errors, rate_limit};
use store::Store;

pub mod billing;
pub mod config;
pub mod error;
pub mod gateway;
pub mod middleware;
pub mod models;
pub mod poller;
pub mod result;
pub mod routes;
pub mod store;
pub mod utils;

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<dyn Store>,
    pub gateway: Arc<dyn GatewayApi>,
    pub billing: Option<StripeClient>,
}

/// 组装全部路由；限流器只作用于公开的函数接口
pub fn build_router(state: AppState, rate_limiter: Option<Arc<RateLimiter>>) -> Router {
    let mut public_routes = Router::new()
        .route(
            "/functions/generate-token",
            post(routes::token::generate_token),
        )
        .route(
            "/functions/unsubscribe",
            get(routes::unsubscribe::unsubscribe).post(routes::unsubscribe::unsubscribe),
        );
    if let Some(limiter) = rate_limiter {
        public_routes =
            public_routes.route_layer(axum::middleware::from_fn_with_state(limiter, rate_limit));
    }

    let protected_routes = Router::new()
        .route(
            "/functions/customer-portal",
            post(routes::billing::customer_portal),
        )
        // 组织
        .route("/organizations", post(routes::organization::create_organization))
        .route(
            "/organizations/current",
            get(routes::organization::current_organization),
        )
        // 会话
        .route("/sessions", get(routes::session::list_sessions))
        .route(
            "/sessions/{id}",
            get(routes::session::get_session).delete(routes::session::delete_session),
        )
        .route("/sessions/{id}/status", get(routes::session::refresh_status))
        .route("/sessions/{id}/start", post(routes::session::start_session))
        .route("/sessions/{id}/messages", post(routes::session::send_message))
        .route("/dashboard/stats", get(routes::session::dashboard_stats))
        // 公告
        .route(
            "/announcements",
            post(routes::announcement::create_announcement),
        )
        .route(
            "/announcements/unread",
            get(routes::announcement::unread_announcements),
        )
        .route(
            "/announcements/{id}/read",
            post(routes::announcement::mark_read),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    let api = Router::new().merge(public_routes).merge(protected_routes);
    let router = if state.config.api_base_uri.is_empty() || state.config.api_base_uri == "/" {
        api
    } else {
        Router::new().nest(&state.config.api_base_uri, api)
    };

    router
        .layer(axum::middleware::from_fn(log_errors))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
