use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{Shop, User};

/// Creates a shop together with the account that operates it.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateShopRequest {
    pub name: String,
    pub owner: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ShopAccount {
    pub shop: Shop,
    pub user: User,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct ShopList {
    #[schema(value_type = Vec<Shop>)]
    pub items: Vec<Shop>,
}
