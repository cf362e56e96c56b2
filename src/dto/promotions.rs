use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::models::{Promotion, PromotionType};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePromotionRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: PromotionType,
    pub value: i64,
    #[serde(default)]
    pub min_order_value: i64,
    pub max_discount: Option<i64>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub max_usage: Option<i64>,
    #[serde(default)]
    pub applicable_products: Vec<Uuid>,
    #[serde(default)]
    pub applicable_users: Vec<Uuid>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct PromotionList {
    #[schema(value_type = Vec<Promotion>)]
    pub items: Vec<Promotion>,
}
