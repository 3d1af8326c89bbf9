use axum::{
    Json,
    body::Bytes,
    extract::{Query, State, rejection::QueryRejection},
};

use super::model::{
    UNSUBSCRIBED_MESSAGE, UnsubscribeParams, UnsubscribeResponse, decode_unsubscribe_token,
};
use crate::{AppState, error::AppError, result::ApiResult};

/// 关闭 `token` 对应用户的提醒邮件。
/// 优先使用查询串里的 token，没有时才读取 JSON 请求体
pub async fn unsubscribe(
    State(state): State<AppState>,
    query: Result<Query<UnsubscribeParams>, QueryRejection>,
    body: Bytes,
) -> Result<Json<ApiResult<UnsubscribeResponse>>, AppError> {
    let Query(params) = query.map_err(|e| {
        tracing::debug!("Rejected unsubscribe query: {}", e);
        AppError::Validation("invalid query string".into())
    })?;
    let token = match params.token.filter(|t| !t.trim().is_empty()) {
        Some(token) => token,
        None => token_from_body(&body)?,
    };

    let user_id = decode_unsubscribe_token(&token)?;
    if !state.store.set_unsubscribed(user_id).await? {
        return Err(AppError::NotFound { entity: "user" });
    }
    tracing::info!("User {} unsubscribed from reminders", user_id);

    Ok(Json(ApiResult::success(UnsubscribeResponse {
        message: UNSUBSCRIBED_MESSAGE.to_string(),
    })))
}

fn token_from_body(body: &[u8]) -> Result<String, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Err(AppError::Validation("token is required".into()));
    }
    let params: UnsubscribeParams = serde_json::from_slice(body)
        .map_err(|_| AppError::Validation("invalid request body".into()))?;
    params
        .token
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| AppError::Validation("token is required".into()))
}
