use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct CustomerPortalResponse {
    pub url: String,
}
