use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::UnknownVariant;

/// 会话连接状态，只由轮询器刷新
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionStatus {
    #[default]
    Unknown,
    Online,
    Offline,
    AwaitingQr,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Unknown => "unknown",
            SessionStatus::Online => "online",
            SessionStatus::Offline => "offline",
            SessionStatus::AwaitingQr => "awaiting-qr",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SessionStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(SessionStatus::Unknown),
            "online" => Ok(SessionStatus::Online),
            "offline" => Ok(SessionStatus::Offline),
            "awaiting-qr" => Ok(SessionStatus::AwaitingQr),
            other => Err(UnknownVariant {
                kind: "session status",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub organization_id: Uuid,
    pub name: String,
    pub external_session_id: String,
    /// 网关签发后不可变
    #[serde(skip_serializing)]
    pub api_token: String,
    #[serde(skip_serializing)]
    pub api_token_full: String,
    pub status: SessionStatus,
    pub qr_payload: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// 列表里只展示令牌前几位
    pub fn masked_token(&self) -> String {
        let visible: String = self.api_token.chars().take(6).collect();
        format!("{visible}…")
    }
}

#[derive(Debug, Clone)]
pub struct NewSession {
    pub organization_id: Uuid,
    pub name: String,
    pub external_session_id: String,
    pub api_token: String,
    pub api_token_full: String,
}
