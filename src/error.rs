use axum::Json;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::billing::BillingError;
use crate::gateway::GatewayError;
use crate::poller::PollError;
use crate::store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("missing or invalid authorization")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Validation(String),

    #[error("{entity} not found")]
    NotFound { entity: &'static str },

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Billing(#[from] BillingError),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity } => AppError::NotFound { entity },
            StoreError::Conflict(msg) => AppError::Conflict(msg),
            other => AppError::Store(other),
        }
    }
}

impl From<PollError> for AppError {
    fn from(err: PollError) -> Self {
        match err {
            PollError::Gateway(e) => AppError::Gateway(e),
            PollError::Store(e) => e.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_status: Option<u16>,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Gateway(_) => StatusCode::BAD_GATEWAY,
            AppError::Billing(BillingError::NotConfigured) => StatusCode::BAD_REQUEST,
            AppError::Billing(_) => StatusCode::BAD_GATEWAY,
            AppError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> ErrorResponse {
        let error = match self {
            // 数据库细节不外泄
            AppError::Store(e) => {
                tracing::error!("Store failure: {}", e);
                "internal server error".to_string()
            }
            other => other.to_string(),
        };
        let upstream_status = match self {
            AppError::Gateway(e) => e.upstream_status(),
            AppError::Billing(BillingError::Upstream { status, .. }) => Some(*status),
            _ => None,
        };

        ErrorResponse {
            success: false,
            error,
            upstream_status,
        }
    }

    /// 部分函数接口约定所有失败都用同一个状态码
    pub fn into_response_with(self, status: StatusCode) -> Response {
        (status, Json(self.body())).into_response()
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        self.into_response_with(status)
    }
}
