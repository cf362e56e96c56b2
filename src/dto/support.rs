use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::SupportRequest;

#[derive(Debug, Deserialize, ToSchema)]
pub struct SupportRequestPayload {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct SupportRequestList {
    #[schema(value_type = Vec<SupportRequest>)]
    pub items: Vec<SupportRequest>,
}
