use serde::Serialize;

/// 成功响应：`{"success": true, ...data}`
#[derive(Debug, Serialize)]
pub struct ApiResult<T: Serialize> {
    pub success: bool,
    #[serde(flatten)]
    pub content: T,
}

impl<T: Serialize> ApiResult<T> {
    pub fn success(content: T) -> Self {
        Self {
            success: true,
            content,
        }
    }
}
