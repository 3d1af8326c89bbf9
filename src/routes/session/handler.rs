use axum::{
    Extension, Json,
    extract::{Path, State},
};
use uuid::Uuid;

use super::model::{
    DashboardStats, DeleteSessionResponse, SendMessageRequest, SendMessageResponse,
    SessionDetailResponse, SessionListResponse, SessionResponse, SessionView,
    StartSessionResponse, normalize_phone,
};
use crate::{
    AppState,
    error::AppError,
    gateway::OutgoingMessage,
    models::{Session, SessionStatus, User},
    poller::{classify, reconcile},
    result::ApiResult,
    routes::caller,
    utils::Claims,
};

async fn organization_of(state: &AppState, claims: &Claims) -> Result<(User, Uuid), AppError> {
    let user = caller(state, claims).await?;
    let organization_id = user.organization_id.ok_or(AppError::NotFound {
        entity: "organization",
    })?;
    Ok((user, organization_id))
}

// 其他租户的会话一律当作不存在
async fn owned_session(
    state: &AppState,
    organization_id: Uuid,
    id: Uuid,
) -> Result<Session, AppError> {
    state
        .store
        .find_session(organization_id, id)
        .await?
        .ok_or(AppError::NotFound { entity: "session" })
}

#[axum::debug_handler]
pub async fn list_sessions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<ApiResult<SessionListResponse>>, AppError> {
    let (_, organization_id) = organization_of(&state, &claims).await?;
    let sessions = state.store.list_sessions(organization_id).await?;

    Ok(Json(ApiResult::success(SessionListResponse {
        sessions: sessions.into_iter().map(SessionView::from).collect(),
    })))
}

#[axum::debug_handler]
pub async fn get_session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResult<SessionDetailResponse>>, AppError> {
    let (_, organization_id) = organization_of(&state, &claims).await?;
    let session = owned_session(&state, organization_id, id).await?;

    Ok(Json(ApiResult::success(SessionDetailResponse {
        api_token: session.api_token.clone(),
        api_token_full: session.api_token_full.clone(),
        session: session.into(),
    })))
}

/// 按需检查状态，归类规则与轮询一致
#[axum::debug_handler]
pub async fn refresh_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResult<SessionResponse>>, AppError> {
    let (_, organization_id) = organization_of(&state, &claims).await?;
    let session = owned_session(&state, organization_id, id).await?;

    let (session, _) = reconcile(state.store.as_ref(), state.gateway.as_ref(), &session).await?;

    Ok(Json(ApiResult::success(SessionResponse {
        session: session.into(),
    })))
}

#[axum::debug_handler]
pub async fn start_session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResult<StartSessionResponse>>, AppError> {
    let (_, organization_id) = organization_of(&state, &claims).await?;
    let session = owned_session(&state, organization_id, id).await?;

    let reply = state
        .gateway
        .start_session(&session.external_session_id, &session.api_token)
        .await?;
    let status = classify(&reply);
    let qr_payload = match status {
        SessionStatus::AwaitingQr => reply.qr_payload().map(str::to_string),
        _ => None,
    };
    state
        .store
        .update_session_state(session.id, status, qr_payload.as_deref())
        .await?;
    tracing::info!("Started session {} ({})", session.id, status);

    Ok(Json(ApiResult::success(StartSessionResponse {
        status,
        qr_payload,
    })))
}

#[axum::debug_handler]
pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
    Json(req): Json<SendMessageRequest>,
) -> Result<Json<ApiResult<SendMessageResponse>>, AppError> {
    let phone = normalize_phone(&req.phone)?;
    if req.message.trim().is_empty() {
        return Err(AppError::Validation("message must not be empty".into()));
    }
    let (_, organization_id) = organization_of(&state, &claims).await?;
    let session = owned_session(&state, organization_id, id).await?;

    let result = state
        .gateway
        .send_message(
            &session.external_session_id,
            &session.api_token,
            &OutgoingMessage {
                phone,
                message: req.message,
                is_group: false,
            },
        )
        .await?;

    Ok(Json(ApiResult::success(SendMessageResponse { result })))
}

/// 先在网关登出会话再删除记录；登出失败不影响删除
#[axum::debug_handler]
pub async fn delete_session(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResult<DeleteSessionResponse>>, AppError> {
    let (user, organization_id) = organization_of(&state, &claims).await?;
    if !user.role.is_admin() {
        return Err(AppError::Forbidden(
            "only organization admins can delete sessions".into(),
        ));
    }
    let session = owned_session(&state, organization_id, id).await?;

    if let Err(e) = state
        .gateway
        .logout_session(&session.external_session_id, &session.api_token)
        .await
    {
        tracing::warn!("Gateway logout failed for session {}: {}", session.id, e);
    }

    let deleted = state.store.delete_session(organization_id, id).await?;
    tracing::info!("Deleted session {} by user {}", id, user.id);

    Ok(Json(ApiResult::success(DeleteSessionResponse { deleted })))
}

#[axum::debug_handler]
pub async fn dashboard_stats(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<ApiResult<DashboardStats>>, AppError> {
    let (_, organization_id) = organization_of(&state, &claims).await?;
    let sessions = state.store.list_sessions(organization_id).await?;
    Ok(Json(ApiResult::success(DashboardStats::tally(&sessions))))
}
