use axum::{
    body::Body,
    extract::State,
    http::Request,
    middleware::Next,
    response::Response,
};

use crate::{AppState, error::AppError, utils::authenticate};

/// 校验 Bearer 令牌，并把 Claims 放进请求扩展
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let claims = authenticate(request.headers(), &state.config)?;
    request.extensions_mut().insert(claims);
    Ok(next.run(request).await)
}
