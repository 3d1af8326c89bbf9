use axum::{
    Json,
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};

use super::model::{IssueTokenRequest, IssueTokenResponse};
use crate::{
    AppState,
    error::AppError,
    models::NewSession,
    result::ApiResult,
    routes::{caller, caller_organization},
    utils::{authenticate, sanitize_organization_name},
};

/// 用调用者的组织名换取网关会话 token，任何失败都返回 400
#[axum::debug_handler]
pub async fn generate_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    match issue_token(&state, &headers, &body).await {
        Ok(issued) => (StatusCode::OK, Json(ApiResult::success(issued))).into_response(),
        Err(e) => {
            tracing::warn!("Token issuance rejected: {}", e);
            e.into_response_with(StatusCode::BAD_REQUEST)
        }
    }
}

async fn issue_token(
    state: &AppState,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<IssueTokenResponse, AppError> {
    let claims = authenticate(headers, &state.config)?;
    let user = caller(state, &claims).await?;
    let organization = caller_organization(state, &user).await?;

    // 校验必须在请求网关之前完成
    let organization_name = sanitize_organization_name(&organization.name)?;
    let request: IssueTokenRequest = if body.iter().all(u8::is_ascii_whitespace) {
        IssueTokenRequest::default()
    } else {
        serde_json::from_slice(body)
            .map_err(|e| AppError::Validation(format!("invalid request body: {e}")))?
    };
    let session_name = request
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| organization_name.clone());

    let issued = state.gateway.generate_token(&organization_name).await?;

    let session = state
        .store
        .insert_session(NewSession {
            organization_id: organization.id,
            name: session_name,
            external_session_id: issued.session.clone(),
            api_token: issued.token.clone(),
            api_token_full: issued.full.clone(),
        })
        .await?;
    tracing::info!(
        "Issued gateway session {} for organization {}",
        session.id,
        organization.id
    );

    Ok(IssueTokenResponse {
        session: issued.session,
        token: issued.token,
        token_full: issued.full,
        organization_name,
        session_id: session.id,
    })
}
