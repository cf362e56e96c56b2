use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    models::{Role, User},
    session::SessionUser,
};

#[derive(Deserialize, Debug, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Where the client should navigate after signing in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
pub enum Landing {
    #[serde(rename = "/admin")]
    AdminDashboard,
    #[serde(rename = "/shop")]
    ShopDashboard,
    #[serde(rename = "/")]
    Home,
}

impl Landing {
    pub fn for_role(role: &Role) -> Self {
        match role {
            Role::Admin => Landing::AdminDashboard,
            Role::Shop { .. } => Landing::ShopDashboard,
            Role::Customer => Landing::Home,
        }
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    pub user: SessionUser,
    pub landing: Landing,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SessionInfo {
    pub user: SessionUser,
    pub cart_items: usize,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(transparent)]
pub struct UserList {
    #[schema(value_type = Vec<User>)]
    pub items: Vec<User>,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct Claims {
    pub sub: String,
    pub sid: String,
    #[serde(flatten)]
    pub role: Role,
    pub exp: usize,
}
