use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{delete, get, post},
};
use uuid::Uuid;

use crate::{
    dto::{
        auth::UserList,
        orders::OrderList,
        products::{ProductList, RejectProductRequest},
        shops::{CreateShopRequest, ShopAccount, ShopList},
    },
    error::AppResult,
    middleware::auth::AuthUser,
    models::{Product, Shop, User},
    response::ApiResponse,
    routes::params::{OrderListQuery, ProductStatusQuery},
    services::{admin_service, product_service},
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_all_orders))
        .route("/products", get(list_products))
        .route("/products/{id}/approve", post(approve_product))
        .route("/products/{id}/reject", post(reject_product))
        .route("/users", get(list_users))
        .route("/users/{id}", delete(delete_user))
        .route("/shops", get(list_shops).post(create_shop))
        .route("/shops/{id}", delete(delete_shop))
}

#[utoipa::path(
    get,
    path = "/api/admin/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "Filter by status"),
        ("sort_order" = Option<String>, Query, description = "Sort order: asc, desc")
    ),
    responses(
    (status = 200, description = "Get all orders (admin only)", body = ApiResponse<OrderList>),
    (status = 403, description = "Forbidden"),
    (status = 500, description = "Internal Server Error"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_all_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<OrderListQuery>,
) -> AppResult<Json<ApiResponse<OrderList>>> {
    let resp = admin_service::list_all_orders(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/products",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "pending, approved, rejected")
    ),
    responses(
    (status = 200, description = "Products by review status (admin only)", body = ApiResponse<ProductList>),
    (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_products(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ProductStatusQuery>,
) -> AppResult<Json<ApiResponse<ProductList>>> {
    let resp = admin_service::list_products(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/admin/products/{id}/approve",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    responses(
    (status = 200, description = "Product approved", body = ApiResponse<Product>),
    (status = 403, description = "Forbidden"),
    (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn approve_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = product_service::approve_product(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/admin/products/{id}/reject",
    params(
        ("id" = Uuid, Path, description = "Product ID")
    ),
    request_body = RejectProductRequest,
    responses(
    (status = 200, description = "Product rejected", body = ApiResponse<Product>),
    (status = 400, description = "Reason is required"),
    (status = 403, description = "Forbidden"),
    (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn reject_product(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<RejectProductRequest>,
) -> AppResult<Json<ApiResponse<Product>>> {
    let resp = product_service::reject_product(&state, &user, id, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/users",
    responses(
    (status = 200, description = "All accounts", body = ApiResponse<UserList>),
    (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_users(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<UserList>>> {
    let resp = admin_service::list_users(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/admin/users/{id}",
    params(
        ("id" = Uuid, Path, description = "User ID")
    ),
    responses(
    (status = 200, description = "User deleted; a shop account takes its shop with it", body = ApiResponse<User>),
    (status = 400, description = "Cannot delete own account"),
    (status = 403, description = "Forbidden"),
    (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn delete_user(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<User>>> {
    let resp = admin_service::delete_user(&state, &user, id).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/admin/shops",
    responses(
    (status = 200, description = "All shops", body = ApiResponse<ShopList>),
    (status = 403, description = "Forbidden"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn list_shops(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<ShopList>>> {
    let resp = admin_service::list_shops(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/admin/shops",
    request_body = CreateShopRequest,
    responses(
    (status = 200, description = "Shop and its account created", body = ApiResponse<ShopAccount>),
    (status = 400, description = "Missing field"),
    (status = 403, description = "Forbidden"),
    (status = 409, description = "Email already registered"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn create_shop(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateShopRequest>,
) -> AppResult<Json<ApiResponse<ShopAccount>>> {
    let resp = admin_service::create_shop(&state, &user, payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    delete,
    path = "/api/admin/shops/{id}",
    params(
        ("id" = Uuid, Path, description = "Shop ID")
    ),
    responses(
    (status = 200, description = "Shop, its account and its products deleted", body = ApiResponse<Shop>),
    (status = 403, description = "Forbidden"),
    (status = 404, description = "Not Found"),
    ),
    security(("bearer_auth" = [])),
    tag = "Admin"
)]
pub async fn delete_shop(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Shop>>> {
    let resp = admin_service::delete_shop(&state, &user, id).await?;
    Ok(Json(resp))
}
