use serde::{Deserialize, Serialize};

use crate::models::Organization;

#[derive(Debug, Deserialize)]
pub struct CreateOrganizationRequest {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct OrganizationResponse {
    pub organization: Organization,
}
