use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use super::{
    GatewayApi, GatewayError, IssuedToken, OutgoingMessage, StatusReply, encode_path_segment,
};

/// 基于 reqwest 的网关客户端，每次调用只请求一次，不重试
#[derive(Clone)]
pub struct HttpGatewayClient {
    base_url: String,
    secret_key: String,
    http: reqwest::Client,
}

impl HttpGatewayClient {
    pub fn new(
        base_url: &str,
        secret_key: &str,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
            http,
        })
    }

    fn url(&self, segments: &[&str]) -> Result<Url, GatewayError> {
        let path: Vec<String> = segments.iter().map(|s| encode_path_segment(s)).collect();
        let raw = format!("{}/api/{}", self.base_url, path.join("/"));
        Url::parse(&raw).map_err(|e| GatewayError::InvalidUrl(format!("{raw}: {e}")))
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, GatewayError> {
        let response = check(request.send().await?).await?;
        Ok(response.json::<T>().await?)
    }
}

async fn check(response: Response) -> Result<Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    // 网关错误体一般是 {"message": "..."}
    let message = serde_json::from_str::<Value>(&body)
        .ok()
        .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
        .unwrap_or(body);

    Err(GatewayError::Upstream {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl GatewayApi for HttpGatewayClient {
    async fn generate_token(&self, session: &str) -> Result<IssuedToken, GatewayError> {
        let url = self.url(&[session, &self.secret_key, "generate-token"])?;
        tracing::debug!("Requesting gateway token for session {}", session);
        self.send(self.http.post(url)).await
    }

    async fn check_connection(
        &self,
        session: &str,
        token: &str,
    ) -> Result<StatusReply, GatewayError> {
        let url = self.url(&[session, "check-connection-session"])?;
        self.send(self.http.get(url).bearer_auth(token)).await
    }

    async fn start_session(&self, session: &str, token: &str) -> Result<StatusReply, GatewayError> {
        let url = self.url(&[session, "start-session"])?;
        let body = json!({ "waitQrCode": true });
        self.send(self.http.post(url).bearer_auth(token).json(&body))
            .await
    }

    async fn send_message(
        &self,
        session: &str,
        token: &str,
        message: &OutgoingMessage,
    ) -> Result<Value, GatewayError> {
        let url = self.url(&[session, "send-message"])?;
        self.send(self.http.post(url).bearer_auth(token).json(message))
            .await
    }

    async fn logout_session(&self, session: &str, token: &str) -> Result<(), GatewayError> {
        let url = self.url(&[session, "logout-session"])?;
        check(self.http.post(url).bearer_auth(token).send().await?).await?;
        Ok(())
    }
}
