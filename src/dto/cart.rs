use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{models::CartLine, session::Session};

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddToCartRequest {
    pub product_id: Uuid,
    pub quantity: i64,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateQuantityRequest {
    pub quantity: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartView {
    pub items: Vec<CartLine>,
    pub total: i64,
    pub count: i64,
}

impl From<&Session> for CartView {
    fn from(session: &Session) -> Self {
        Self {
            items: session.cart.clone(),
            total: session.cart_total().unwrap_or(i64::MAX),
            count: session
                .cart
                .iter()
                .fold(0, |count: i64, line| count.saturating_add(line.quantity)),
        }
    }
}
