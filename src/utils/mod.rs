use std::sync::LazyLock;

use axum::http::HeaderMap;
use axum_extra::headers::{Authorization, HeaderMapExt, authorization::Bearer};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;
use crate::error::AppError;

pub const MAX_ORGANIZATION_NAME_LEN: usize = 100;

static ORGANIZATION_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9\s\-_]+$").expect("valid organization name regex"));

/// 托管后端签发的访问令牌
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // 用户ID
    pub exp: i64,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub aud: Option<String>,
}

impl Claims {
    pub fn user_id(&self) -> Result<Uuid, AppError> {
        Uuid::parse_str(&self.sub).map_err(|_| AppError::Unauthorized)
    }
}

pub fn verify_token(token: &str, config: &Config) -> Result<Claims, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[config.jwt_audience.as_str()]);

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )?;

    Ok(token_data.claims)
}

pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .typed_get::<Authorization<Bearer>>()
        .map(|auth| auth.token().to_string())
}

/// 从请求头解析并校验调用者身份
pub fn authenticate(headers: &HeaderMap, config: &Config) -> Result<Claims, AppError> {
    let token = bearer_token(headers).ok_or(AppError::Unauthorized)?;
    verify_token(&token, config).map_err(|e| {
        tracing::debug!("Rejected bearer token: {}", e);
        AppError::Unauthorized
    })
}

/// 去掉首尾空白，并检查名称只包含网关路径段允许的字符
pub fn sanitize_organization_name(raw: &str) -> Result<String, AppError> {
    let name = raw.trim();
    if name.is_empty() {
        return Err(AppError::Validation("organization name is required".into()));
    }
    if name.chars().count() > MAX_ORGANIZATION_NAME_LEN {
        return Err(AppError::Validation(format!(
            "organization name must be at most {MAX_ORGANIZATION_NAME_LEN} characters"
        )));
    }
    if !ORGANIZATION_NAME.is_match(name) {
        return Err(AppError::Validation(
            "organization name may only contain letters, digits, spaces, hyphens and underscores"
                .into(),
        ));
    }
    Ok(name.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_names() {
        assert_eq!(sanitize_organization_name("  Acme Corp_01 ").unwrap(), "Acme Corp_01");
        assert!(sanitize_organization_name("loja-centro").is_ok());
    }

    #[test]
    fn rejects_injection_characters() {
        for bad in ["acme;drop", "<script>", "a/b", "café", "a.b", ""] {
            assert!(
                matches!(sanitize_organization_name(bad), Err(AppError::Validation(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_overlong_names() {
        let name = "a".repeat(MAX_ORGANIZATION_NAME_LEN + 1);
        assert!(sanitize_organization_name(&name).is_err());
        assert!(sanitize_organization_name(&name[1..]).is_ok());
    }

    #[test]
    fn missing_authorization_is_unauthorized() {
        let headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);
    }
}
