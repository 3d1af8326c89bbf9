//! 外部 WhatsApp 网关的客户端
//!
//! 网关按会话名签发 bearer token，会话生命周期接口都在 `/api/{session}/...` 下

use async_trait::async_trait;
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, utf8_percent_encode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

mod client;

pub use client::HttpGatewayClient;

/// encodeURIComponent 保留的字符
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

pub fn encode_path_segment(segment: &str) -> String {
    utf8_percent_encode(segment, PATH_SEGMENT).to_string()
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway unreachable: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("gateway responded {status}: {message}")]
    Upstream { status: u16, message: String },

    #[error("invalid gateway url: {0}")]
    InvalidUrl(String),
}

impl GatewayError {
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            GatewayError::Upstream { status, .. } => Some(*status),
            GatewayError::Transport(e) => e.status().map(|s| s.as_u16()),
            GatewayError::InvalidUrl(_) => None,
        }
    }
}

/// `generate-token` 的返回值
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct IssuedToken {
    pub session: String,
    pub token: String,
    pub full: String,
}

/// 会话接口的状态回复。
/// `check-connection-session` 返回布尔值，`start-session` 返回 `"QRCODE"` 之类的字符串，所以 `status` 不做强类型
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct StatusReply {
    #[serde(default)]
    pub status: Value,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub qrcode: Option<String>,
}

impl StatusReply {
    pub fn qr_payload(&self) -> Option<&str> {
        self.qrcode.as_deref().filter(|qr| !qr.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    pub phone: String,
    pub message: String,
    pub is_group: bool,
}

#[async_trait]
pub trait GatewayApi: Send + Sync {
    async fn generate_token(&self, session: &str) -> Result<IssuedToken, GatewayError>;

    async fn check_connection(&self, session: &str, token: &str)
    -> Result<StatusReply, GatewayError>;

    async fn start_session(&self, session: &str, token: &str) -> Result<StatusReply, GatewayError>;

    async fn send_message(
        &self,
        session: &str,
        token: &str,
        message: &OutgoingMessage,
    ) -> Result<Value, GatewayError>;

    async fn logout_session(&self, session: &str, token: &str) -> Result<(), GatewayError>;
}
