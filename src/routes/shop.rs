use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};

use crate::{
    dto::{
        orders::{OrderList, PaymentList},
        products::ProductList,
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::Shop,
    response::ApiResponse,
    routes::params::{OrderListQuery, ProductStatusQuery},
    services::shop_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(shop_profile))
        .route("/products", get(shop_products))
        .route("/orders", get(shop_orders))
        .route("/payments", get(shop_payments))
}

#[utoipa::path(
    get,
    path = "/api/shop",
    responses(
        (status = 200, description = "The caller's shop", body = ApiResponse<Shop>),
        (status = 403, description = "Shop accounts only")
    ),
    security(("bearer_auth" = [])),
    tag = "Shop"
)]
pub async fn shop_profile(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<Shop>>> {
    let resp = shop_service::shop_profile(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/shop/products",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "pending, approved, rejected")
    ),
    responses(
        (status = 200, description = "The shop's products in every status", body = ApiResponse<ProductList>),
        (status = 403, description = "Shop accounts only")
    ),
    security(("bearer_auth" = [])),
    tag = "Shop"
)]
pub async fn shop_products(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ProductStatusQuery>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let resp = shop_service::shop_products(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/shop/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "Filter by status"),
        ("sort_order" = Option<String>, Query, description = "Sort order: asc, desc")
    ),
    responses(
        (status = 200, description = "Orders containing the shop's products", body = ApiResponse<OrderList>),
        (status = 403, description = "Shop accounts only")
    ),
    security(("bearer_auth" = [])),
    tag = "Shop"
)]
pub async fn shop_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = shop_service::shop_orders(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/shop/payments",
    responses(
        (status = 200, description = "Payments made to the shop", body = ApiResponse<PaymentList>),
        (status = 403, description = "Shop accounts only")
    ),
    security(("bearer_auth" = [])),
    tag = "Shop"
)]
pub async fn shop_payments(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<PaymentList>>> {
    let resp = shop_service::shop_payments(&state, &user).await?;
    Ok(Json(resp))
}
