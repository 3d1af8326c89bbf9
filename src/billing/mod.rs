//! 组织账单用的 Stripe 客户门户

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum BillingError {
    #[error("billing is not configured for this organization")]
    NotConfigured,

    #[error("billing provider unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("billing provider responded {status}: {message}")]
    Upstream { status: u16, message: String },
}

#[derive(Debug, Clone, Deserialize)]
pub struct PortalSession {
    pub url: String,
}

#[derive(Clone)]
pub struct StripeClient {
    api_base: String,
    secret_key: String,
    http: reqwest::Client,
}

impl StripeClient {
    pub fn new(api_base: &str, secret_key: &str, timeout: Duration) -> Result<Self, BillingError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            api_base: api_base.trim_end_matches('/').to_string(),
            secret_key: secret_key.to_string(),
            http,
        })
    }

    pub async fn create_portal_session(
        &self,
        customer_id: &str,
        return_url: Option<&str>,
    ) -> Result<PortalSession, BillingError> {
        let mut form = vec![("customer", customer_id)];
        if let Some(url) = return_url {
            form.push(("return_url", url));
        }

        let response = self
            .http
            .post(format!("{}/v1/billing_portal/sessions", self.api_base))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            // Stripe 错误体：{"error": {"message": "..."}}
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|v| v.pointer("/error/message")?.as_str().map(str::to_string))
                .unwrap_or(body);
            return Err(BillingError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json::<PortalSession>().await?)
    }
}
