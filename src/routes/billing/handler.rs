use axum::{
    Extension, Json,
    extract::State,
};

use super::model::CustomerPortalResponse;
use crate::{
    AppState,
    billing::BillingError,
    error::AppError,
    result::ApiResult,
    routes::{caller, caller_organization},
    utils::Claims,
};

#[axum::debug_handler]
pub async fn customer_portal(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<ApiResult<CustomerPortalResponse>>, AppError> {
    let stripe = state.billing.as_ref().ok_or(BillingError::NotConfigured)?;
    let user = caller(&state, &claims).await?;
    let organization = caller_organization(&state, &user).await?;
    let customer_id = organization
        .stripe_customer_id
        .as_deref()
        .ok_or(BillingError::NotConfigured)?;

    let portal = stripe
        .create_portal_session(customer_id, state.config.portal_return_url.as_deref())
        .await?;
    tracing::info!(
        "Opened billing portal for organization {}",
        organization.id
    );

    Ok(Json(ApiResult::success(CustomerPortalResponse {
        url: portal.url,
    })))
}
