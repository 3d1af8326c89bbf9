use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::{Session, SessionStatus};

/// 列表视图只露出令牌前缀
#[derive(Debug, Serialize)]
pub struct SessionView {
    pub id: Uuid,
    pub name: String,
    pub external_session_id: String,
    pub status: SessionStatus,
    pub qr_payload: Option<String>,
    pub token_preview: String,
    pub created_at: DateTime<Utc>,
}

impl From<Session> for SessionView {
    fn from(session: Session) -> Self {
        SessionView {
            token_preview: session.masked_token(),
            id: session.id,
            name: session.name,
            external_session_id: session.external_session_id,
            status: session.status,
            qr_payload: session.qr_payload,
            created_at: session.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    pub sessions: Vec<SessionView>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session: SessionView,
}

/// 查看完整 token
#[derive(Debug, Serialize)]
pub struct SessionDetailResponse {
    pub session: SessionView,
    pub api_token: String,
    pub api_token_full: String,
}

#[derive(Debug, Serialize)]
pub struct StartSessionResponse {
    pub status: SessionStatus,
    pub qr_payload: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub phone: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    pub result: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct DeleteSessionResponse {
    pub deleted: bool,
}

#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub total_sessions: usize,
    pub online: usize,
    pub offline: usize,
    pub awaiting_qr: usize,
    pub unknown: usize,
}

impl DashboardStats {
    pub fn tally<'a>(sessions: impl IntoIterator<Item = &'a Session>) -> Self {
        let mut stats = DashboardStats::default();
        for session in sessions {
            stats.total_sessions += 1;
            match session.status {
                SessionStatus::Online => stats.online += 1,
                SessionStatus::Offline => stats.offline += 1,
                SessionStatus::AwaitingQr => stats.awaiting_qr += 1,
                SessionStatus::Unknown => stats.unknown += 1,
            }
        }
        stats
    }
}

/// 允许常见的电话号码符号，只返回数字
pub fn normalize_phone(raw: &str) -> Result<String, AppError> {
    if raw
        .chars()
        .any(|c| !(c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')')))
    {
        return Err(AppError::Validation("invalid phone number".into()));
    }
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    if !(8..=15).contains(&digits.len()) {
        return Err(AppError::Validation("invalid phone number".into()));
    }
    Ok(digits)
}
