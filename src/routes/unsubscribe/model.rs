use std::sync::LazyLock;

use base64::{
    Engine,
    engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD},
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

pub const UNSUBSCRIBED_MESSAGE: &str =
    "Você foi removido da lista de lembretes e não receberá novos e-mails.";

static UUID_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$")
        .expect("valid uuid regex")
});

#[derive(Debug, Default, Deserialize)]
pub struct UnsubscribeParams {
    pub token: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct UnsubscribeResponse {
    pub message: String,
}

/// 解码退订令牌：内容是用户 id（标准 UUID 文本）的 base64
pub fn decode_unsubscribe_token(token: &str) -> Result<Uuid, AppError> {
    // 查询串里未转义的 '+' 会被解码成空格
    let token = token.trim().replace(' ', "+");

    let bytes = STANDARD
        .decode(&token)
        .or_else(|_| URL_SAFE_NO_PAD.decode(token.trim_end_matches('=')))
        .map_err(|_| AppError::Validation("invalid token encoding".into()))?;
    let text = String::from_utf8(bytes)
        .map_err(|_| AppError::Validation("invalid token encoding".into()))?;

    if !UUID_PATTERN.is_match(&text) {
        return Err(AppError::Validation("invalid token".into()));
    }
    Uuid::parse_str(&text).map_err(|_| AppError::Validation("invalid token".into()))
}
