use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use super::model::{AnnouncementResponse, MarkReadResponse, UnreadAnnouncementsResponse};
use crate::{
    AppState,
    error::AppError,
    models::{NewAnnouncement, Role},
    poller::AnnouncementFeed,
    result::ApiResult,
    routes::caller,
    utils::Claims,
};

#[axum::debug_handler]
pub async fn unread_announcements(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<ApiResult<UnreadAnnouncementsResponse>>, AppError> {
    let feed = AnnouncementFeed::new(state.store.clone(), claims.user_id()?);
    let announcements = feed.refresh().await?;

    Ok(Json(ApiResult::success(UnreadAnnouncementsResponse {
        announcements,
    })))
}

/// 重复确认同样返回成功
#[axum::debug_handler]
pub async fn mark_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResult<MarkReadResponse>>, AppError> {
    let feed = AnnouncementFeed::new(state.store.clone(), claims.user_id()?);
    feed.acknowledge(id).await?;
    Ok(Json(ApiResult::success(MarkReadResponse {})))
}

#[axum::debug_handler]
pub async fn create_announcement(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<NewAnnouncement>,
) -> Result<(StatusCode, Json<ApiResult<AnnouncementResponse>>), AppError> {
    let user = caller(&state, &claims).await?;
    if user.role != Role::Superadmin {
        return Err(AppError::Forbidden(
            "only superadmins can publish announcements".into(),
        ));
    }
    if req.title.trim().is_empty() || req.message.trim().is_empty() {
        return Err(AppError::Validation(
            "title and message must not be empty".into(),
        ));
    }

    let announcement = state.store.create_announcement(req).await?;
    tracing::info!("Published announcement {}", announcement.id);

    Ok((
        StatusCode::CREATED,
        Json(ApiResult::success(AnnouncementResponse { announcement })),
    ))
}
