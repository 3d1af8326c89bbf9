pub mod announcement;
pub mod billing;
pub mod organization;
pub mod session;
pub mod token;
pub mod unsubscribe;

use crate::{
    AppState,
    error::AppError,
    models::{Organization, User},
    utils::Claims,
};

/// 令牌对应的用户记录
pub(crate) async fn caller(state: &AppState, claims: &Claims) -> Result<User, AppError> {
    state
        .store
        .find_user(claims.user_id()?)
        .await?
        .ok_or(AppError::NotFound { entity: "user" })
}

pub(crate) async fn caller_organization(
    state: &AppState,
    user: &User,
) -> Result<Organization, AppError> {
    let organization_id = user
        .organization_id
        .ok_or(AppError::NotFound {
            entity: "organization",
        })?;
    state
        .store
        .find_organization(organization_id)
        .await?
        .ok_or(AppError::NotFound {
            entity: "organization",
        })
}
