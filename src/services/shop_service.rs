use uuid::Uuid;

use crate::{
    dto::{
        orders::{OrderList, PaymentList},
        products::ProductList,
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_shop},
    models::{Payment, Product, Shop},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, ProductStatusQuery},
    services::{current_session, order_service::select_orders},
    state::AppState,
};

/// The shop the caller operates, taken from the stored session.
async fn own_shop(state: &AppState, user: &AuthUser) -> AppResult<Uuid> {
    let session = current_session(state, user).await?;
    ensure_shop(&session.role())
}

/// A shop's products in every review state, newest submission first.
pub fn products_of(
    products: &[Product],
    shop_id: Uuid,
    query: &ProductStatusQuery,
) -> (Vec<Product>, Meta) {
    let mut items: Vec<Product> = products
        .iter()
        .filter(|p| p.shop_id == shop_id)
        .filter(|p| query.status.is_none_or(|status| p.status == status))
        .cloned()
        .collect();
    items.sort_by_key(|p| std::cmp::Reverse(p.submitted_at));
    query.pagination().apply(items)
}

pub fn payments_of(payments: &[Payment], shop_id: Uuid) -> Vec<Payment> {
    let mut items: Vec<Payment> = payments
        .iter()
        .filter(|p| p.shop_id == shop_id)
        .cloned()
        .collect();
    items.sort_by_key(|p| std::cmp::Reverse(p.payment_date));
    items
}

pub async fn shop_profile(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<Shop>> {
    let shop_id = own_shop(state, user).await?;
    let shop = state
        .read(|s| s.shop(shop_id).cloned())
        .await
        .ok_or(AppError::NotFound)?;
    Ok(ApiResponse::success("OK", shop, None))
}

pub async fn shop_products(
    state: &AppState,
    user: &AuthUser,
    query: ProductStatusQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let shop_id = own_shop(state, user).await?;
    let (items, meta) = state
        .read(|s| products_of(&s.products, shop_id, &query))
        .await;
    Ok(ApiResponse::success("Products", ProductList { items }, Some(meta)))
}

/// Orders that contain at least one of the shop's products.
pub async fn shop_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    let shop_id = own_shop(state, user).await?;
    let (items, meta) = state
        .read(|s| {
            select_orders(s.orders.iter().filter(|o| o.involves_shop(shop_id)), &query)
        })
        .await;
    Ok(ApiResponse::success("Ok", OrderList { items }, Some(meta)))
}

pub async fn shop_payments(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<PaymentList>> {
    let shop_id = own_shop(state, user).await?;
    let items = state.read(|s| payments_of(&s.payments, shop_id)).await;
    let total = items.len();
    Ok(ApiResponse::success(
        "Payments",
        PaymentList { items },
        Some(Meta::total(total)),
    ))
}
