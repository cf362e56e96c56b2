use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    dto::{
        auth::UserList,
        orders::OrderList,
        products::ProductList,
        shops::{CreateShopRequest, ShopAccount, ShopList},
    },
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Product, Role, Shop, User},
    response::{ApiResponse, Meta},
    routes::params::{OrderListQuery, ProductStatusQuery},
    services::{
        auth_service::{create_user, credentials, hash_password},
        current_session,
        order_service::select_orders,
        required, signed_in,
    },
    state::AppState,
    storefront::Draft,
};

async fn require_admin(state: &AppState, user: &AuthUser) -> AppResult<()> {
    ensure_admin(&current_session(state, user).await?.role())
}

/// Products filtered by review state, oldest submission first so the queue
/// reads in arrival order.
pub fn products_by_status(
    products: &[Product],
    query: &ProductStatusQuery,
) -> (Vec<Product>, Meta) {
    let mut items: Vec<Product> = products
        .iter()
        .filter(|p| query.status.is_none_or(|status| p.status == status))
        .cloned()
        .collect();
    items.sort_by_key(|p| p.submitted_at);
    query.pagination().apply(items)
}

/// Creates a shop together with the account that operates it.
pub fn provision_shop(
    draft: &mut Draft,
    name: String,
    owner: String,
    email: String,
    password_hash: String,
    now: DateTime<Utc>,
) -> AppResult<ShopAccount> {
    ensure_admin(&signed_in(draft)?.role())?;

    let shop = Shop {
        id: Uuid::new_v4(),
        name,
        owner: owner.clone(),
        email: email.clone(),
        created_at: now,
    };
    let mut user = create_user(draft, email, password_hash, Role::Shop { shop_id: shop.id }, now)?;
    user.name = Some(owner);
    if let Some(stored) = draft.users_mut().iter_mut().find(|u| u.id == user.id) {
        stored.name = user.name.clone();
    }
    draft.shops_mut().push(shop.clone());

    Ok(ShopAccount {
        shop,
        user: user.redacted(),
    })
}

/// Removes a shop, the accounts operating it, and its products.
/// Orders and payments that mention the shop are kept.
fn remove_shop(draft: &mut Draft, shop_id: Uuid) -> bool {
    let shops = draft.shops_mut();
    let before = shops.len();
    shops.retain(|s| s.id != shop_id);
    let removed = shops.len() != before;

    draft
        .users_mut()
        .retain(|u| u.role.shop_id() != Some(shop_id));
    draft.products_mut().retain(|p| p.shop_id != shop_id);
    removed
}

pub fn remove_user(draft: &mut Draft, id: Uuid) -> AppResult<User> {
    let session = signed_in(draft)?;
    ensure_admin(&session.role())?;
    if session.user.user_id == id {
        return Err(AppError::validation("You cannot delete your own account"));
    }

    let user = draft
        .storefront()
        .user(id)
        .cloned()
        .ok_or(AppError::NotFound)?;
    draft.users_mut().retain(|u| u.id != id);
    if let Some(shop_id) = user.role.shop_id() {
        remove_shop(draft, shop_id);
    }
    Ok(user.redacted())
}

pub fn remove_shop_account(draft: &mut Draft, shop_id: Uuid) -> AppResult<Shop> {
    ensure_admin(&signed_in(draft)?.role())?;
    let shop = draft
        .storefront()
        .shop(shop_id)
        .cloned()
        .ok_or(AppError::NotFound)?;
    remove_shop(draft, shop_id);
    Ok(shop)
}

pub async fn list_all_orders(
    state: &AppState,
    user: &AuthUser,
    query: OrderListQuery,
) -> AppResult<ApiResponse<OrderList>> {
    require_admin(state, user).await?;
    let (items, meta) = state
        .read(|s| select_orders(s.orders.iter(), &query))
        .await;
    Ok(ApiResponse::success("Orders", OrderList { items }, Some(meta)))
}

pub async fn list_products(
    state: &AppState,
    user: &AuthUser,
    query: ProductStatusQuery,
) -> AppResult<ApiResponse<ProductList>> {
    require_admin(state, user).await?;
    let (items, meta) = state
        .read(|s| products_by_status(&s.products, &query))
        .await;
    Ok(ApiResponse::success("Products", ProductList { items }, Some(meta)))
}

pub async fn list_users(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<UserList>> {
    require_admin(state, user).await?;
    let items: Vec<User> = state
        .read(|s| s.users.iter().map(User::redacted).collect())
        .await;
    let total = items.len();
    Ok(ApiResponse::success("Users", UserList { items }, Some(Meta::total(total))))
}

pub async fn list_shops(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<ShopList>> {
    require_admin(state, user).await?;
    let items = state.read(|s| s.shops.clone()).await;
    let total = items.len();
    Ok(ApiResponse::success("Shops", ShopList { items }, Some(Meta::total(total))))
}

pub async fn create_shop(
    state: &AppState,
    user: &AuthUser,
    payload: CreateShopRequest,
) -> AppResult<ApiResponse<ShopAccount>> {
    let name = required("name", &payload.name)?;
    let owner = required("owner", &payload.owner)?;
    let (email, password) = credentials(&payload.email, &payload.password)?;
    let password_hash = hash_password(&password)?;

    let account = state
        .transact(Some(user.session_id), |draft| {
            provision_shop(draft, name, owner, email, password_hash, Utc::now())
        })
        .await?;

    tracing::info!(
        shop_id = %account.shop.id,
        user_id = %account.user.id,
        "shop provisioned"
    );
    Ok(ApiResponse::success("Shop created", account, Some(Meta::empty())))
}

pub async fn delete_user(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<User>> {
    let deleted = state
        .transact(Some(user.session_id), |draft| remove_user(draft, id))
        .await?;

    tracing::info!(user_id = %deleted.id, role = %deleted.role.bucket(), "user deleted");
    Ok(ApiResponse::success("User deleted", deleted, Some(Meta::empty())))
}

pub async fn delete_shop(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Shop>> {
    let shop = state
        .transact(Some(user.session_id), |draft| remove_shop_account(draft, id))
        .await?;

    tracing::info!(shop_id = %shop.id, "shop deleted");
    Ok(ApiResponse::success("Shop deleted", shop, Some(Meta::empty())))
}
