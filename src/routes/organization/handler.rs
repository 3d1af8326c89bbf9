use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
};

use super::model::{CreateOrganizationRequest, OrganizationResponse};
use crate::{
    AppState,
    error::AppError,
    result::ApiResult,
    routes::{caller, caller_organization},
    utils::{Claims, sanitize_organization_name},
};

/// 首个管理员为租户创建组织
#[axum::debug_handler]
pub async fn create_organization(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<CreateOrganizationRequest>,
) -> Result<(StatusCode, Json<ApiResult<OrganizationResponse>>), AppError> {
    let name = sanitize_organization_name(&req.name)?;
    let user = caller(&state, &claims).await?;
    if user.organization_id.is_some() {
        return Err(AppError::Conflict(
            "user already belongs to an organization".into(),
        ));
    }

    let organization = state.store.create_organization(user.id, &name).await?;

    Ok((
        StatusCode::CREATED,
        Json(ApiResult::success(OrganizationResponse { organization })),
    ))
}

#[axum::debug_handler]
pub async fn current_organization(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<ApiResult<OrganizationResponse>>, AppError> {
    let user = caller(&state, &claims).await?;
    let organization = caller_organization(&state, &user).await?;
    Ok(Json(ApiResult::success(OrganizationResponse { organization })))
}
