use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use sqlx::Executor;
use sqlx::postgres::PgPoolOptions;
use tokio::sync::watch;
#[cfg(debug_assertions)]
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wadash::{
    AppState, billing::StripeClient, build_router, config::Config, gateway::HttpGatewayClient,
    middleware::RateLimiter, poller::SessionStatusPoller, store::PgStore,
};

#[tokio::main]
async fn main() {
    // 初始化日志
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // 加载配置
    let config = Config::from_env().expect("Failed to load configuration");

    // 数据库连接池
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .after_connect(|conn, _meta| {
            Box::pin(async move {
                conn.execute("SET application_name = 'wadash';").await?;
                Ok(())
            })
        })
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to Postgres");
    let store = Arc::new(PgStore::new(pool));

    let gateway = Arc::new(
        HttpGatewayClient::new(
            &config.gateway_base_url,
            &config.gateway_secret_key,
            config.gateway_timeout(),
        )
        .expect("Failed to build gateway client"),
    );

    let billing = config.stripe_secret_key.as_deref().map(|key| {
        StripeClient::new(&config.stripe_api_base, key, config.gateway_timeout())
            .expect("Failed to build Stripe client")
    });
    if billing.is_none() {
        tracing::info!("STRIPE_SECRET_KEY not set, customer portal disabled");
    }

    let state = AppState {
        config: config.clone(),
        store: store.clone(),
        gateway: gateway.clone(),
        billing,
    };

    // 限流器（未配置 Redis 时关闭）
    let rate_limiter = match config.redis_url.as_deref() {
        Some(url) => {
            let client = redis::Client::open(url).expect("Failed to create Redis client");
            Some(Arc::new(RateLimiter::new(client, config.clone())))
        }
        None => {
            tracing::warn!("REDIS_URL not set, rate limiting disabled");
            None
        }
    };

    // 后台轮询会话状态
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poller = SessionStatusPoller::new(store, gateway, config.session_poll_interval());
    let poller_handle = tokio::spawn(poller.run(shutdown_rx));

    let router = build_router(state, rate_limiter);

    #[cfg(debug_assertions)]
    let router = {
        tracing::debug!("Adding CORS layer for development mode");
        router.layer(CorsLayer::permissive())
    };

    let addr = SocketAddr::new(
        config.server_host.parse().unwrap_or_else(|_| {
            tracing::warn!("Invalid server_host, falling back to dual-stack default");
            IpAddr::V6(std::net::Ipv6Addr::UNSPECIFIED)
        }),
        config.server_port,
    );
    tracing::info!("Server listening on {}", addr);
    axum::serve(
        tokio::net::TcpListener::bind(&addr)
            .await
            .expect("Failed to bind"),
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Shutdown signal received");
        shutdown_tx.send_replace(true);
    })
    .await
    .expect("Failed to start server");

    poller_handle.await.ok();
}
