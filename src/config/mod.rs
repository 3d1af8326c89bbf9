use std::env;
use std::time::Duration;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub database_url: String,
    pub redis_url: Option<String>,
    pub jwt_secret: String,
    pub jwt_audience: String,
    pub rate_limit_window_secs: u64,
    pub rate_limit_requests: u32,
    pub trust_proxy_headers: bool,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
    pub gateway_base_url: String,
    pub gateway_secret_key: String,
    pub gateway_timeout_secs: u64,
    pub session_poll_interval_secs: u64,
    pub stripe_secret_key: Option<String>,
    pub stripe_api_base: String,
    pub portal_return_url: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        Ok(Config {
            database_url: env::var("DATABASE_URL")?,
            redis_url: optional("REDIS_URL"),
            jwt_secret: env::var("JWT_SECRET")?,
            jwt_audience: optional("JWT_AUDIENCE").unwrap_or_else(|| "authenticated".into()),
            rate_limit_window_secs: parsed("RATE_LIMIT_WINDOW", 60),
            rate_limit_requests: parsed("RATE_LIMIT_REQUESTS", 100),
            trust_proxy_headers: parsed("TRUST_PROXY_HEADERS", false),
            server_host: optional("SERVER_HOST").unwrap_or_else(|| "0.0.0.0".into()),
            server_port: parsed("SERVER_PORT", 3000),
            api_base_uri: optional("API_BASE_URI").unwrap_or_else(|| "/api".into()),
            gateway_base_url: env::var("GATEWAY_BASE_URL")?,
            gateway_secret_key: env::var("GATEWAY_SECRET_KEY")?,
            gateway_timeout_secs: parsed("GATEWAY_TIMEOUT_SECS", 30),
            session_poll_interval_secs: seconds("SESSION_POLL_INTERVAL", 10),
            stripe_secret_key: optional("STRIPE_SECRET_KEY"),
            stripe_api_base: optional("STRIPE_API_BASE")
                .unwrap_or_else(|| "https://api.stripe.com".into()),
            portal_return_url: optional("PORTAL_RETURN_URL"),
        })
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    pub fn gateway_timeout(&self) -> Duration {
        Duration::from_secs(self.gateway_timeout_secs)
    }

    pub fn session_poll_interval(&self) -> Duration {
        Duration::from_secs(self.session_poll_interval_secs.max(1))
    }
}

fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    optional(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

// 间隔允许写成 "30s"
fn seconds(key: &str, default: u64) -> u64 {
    optional(key)
        .and_then(|v| v.trim().trim_end_matches('s').parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poll_interval_never_zero() {
        let config = Config {
            database_url: "postgres://localhost/test".into(),
            redis_url: None,
            jwt_secret: "secret".into(),
            jwt_audience: "authenticated".into(),
            rate_limit_window_secs: 60,
            rate_limit_requests: 100,
            trust_proxy_headers: false,
            server_host: "127.0.0.1".into(),
            server_port: 3000,
            api_base_uri: "/api".into(),
            gateway_base_url: "http://localhost:21465".into(),
            gateway_secret_key: "THISISMYSECURETOKEN".into(),
            gateway_timeout_secs: 30,
            session_poll_interval_secs: 0,
            stripe_secret_key: None,
            stripe_api_base: "https://api.stripe.com".into(),
            portal_return_url: None,
        };

        assert_eq!(config.session_poll_interval(), Duration::from_secs(1));
    }
}
