use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Default, Deserialize)]
pub struct IssueTokenRequest {
    /// 会话显示名，缺省用组织名
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct IssueTokenResponse {
    pub session: String,
    pub token: String,
    pub token_full: String,
    pub organization_name: String,
    pub session_id: Uuid,
}
