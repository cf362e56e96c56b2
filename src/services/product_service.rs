use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    dto::products::{CreateProductRequest, ProductList, RejectProductRequest, UpdateProductRequest},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin, ensure_shop},
    models::{NotificationType, Product, ProductStatus, Role, RoleBucket},
    response::{ApiResponse, Meta},
    routes::params::{ProductQuery, ProductSortBy, SortOrder},
    services::{
        notification_service::{Event, notify},
        required, required_opt, signed_in,
    },
    state::AppState,
    storefront::Draft,
};

/// Whether `viewer` may see `product`. Anonymous visitors count as customers.
pub fn can_view(product: &Product, viewer: Option<&Role>) -> bool {
    viewer.is_some_and(Role::is_staff) || product.is_approved()
}

/// Staff see the whole catalog; everyone else only approved products.
pub fn visible_products<'a>(products: &'a [Product], viewer: Option<&Role>) -> Vec<&'a Product> {
    products.iter().filter(|p| can_view(p, viewer)).collect()
}

fn matches_query(product: &Product, query: &ProductQuery) -> bool {
    if let Some(q) = query.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        let q = q.to_lowercase();
        let in_name = product.name.to_lowercase().contains(&q);
        let in_description = product
            .description
            .as_deref()
            .is_some_and(|d| d.to_lowercase().contains(&q));
        if !in_name && !in_description {
            return false;
        }
    }
    if let Some(category) = query.category.as_deref().filter(|c| !c.is_empty()) {
        if !product.category.eq_ignore_ascii_case(category) {
            return false;
        }
    }
    query.min_price.is_none_or(|min| product.price >= min)
        && query.max_price.is_none_or(|max| product.price <= max)
}

pub fn search_catalog(
    products: &[Product],
    viewer: Option<&Role>,
    query: &ProductQuery,
) -> (Vec<Product>, Meta) {
    let mut items: Vec<Product> = visible_products(products, viewer)
        .into_iter()
        .filter(|p| matches_query(p, query))
        .cloned()
        .collect();

    match query.sort_by.unwrap_or_default() {
        ProductSortBy::SubmittedAt => items.sort_by_key(|p| p.submitted_at),
        ProductSortBy::Price => items.sort_by_key(|p| p.price),
        ProductSortBy::Name => items.sort_by_key(|p| p.name.to_lowercase()),
    }
    if matches!(query.sort_order.unwrap_or_default(), SortOrder::Desc) {
        items.reverse();
    }
    query.pagination().apply(items)
}

/// Looks a product up for `viewer`; hidden products are reported as missing.
pub fn find_visible(products: &[Product], viewer: Option<&Role>, id: Uuid) -> AppResult<Product> {
    products
        .iter()
        .find(|p| p.id == id && can_view(p, viewer))
        .cloned()
        .ok_or(AppError::NotFound)
}

fn validate_price(price: i64) -> AppResult<i64> {
    if price <= 0 {
        return Err(AppError::validation("price must be greater than 0"));
    }
    Ok(price)
}

pub fn submit_product(
    draft: &mut Draft,
    payload: CreateProductRequest,
    now: DateTime<Utc>,
) -> AppResult<Product> {
    let shop_id = ensure_shop(&signed_in(draft)?.role())?;
    let product = Product {
        id: Uuid::new_v4(),
        shop_id,
        name: required("name", &payload.name)?,
        description: payload.description.map(|d| d.trim().to_string()).filter(|d| !d.is_empty()),
        image: payload.image.map(|i| i.trim().to_string()).filter(|i| !i.is_empty()),
        price: validate_price(payload.price)?,
        category: required("category", &payload.category)?,
        status: ProductStatus::Pending,
        rejection_reason: None,
        submitted_at: now,
        reviewed_at: None,
    };
    draft.products_mut().push(product.clone());

    notify(
        draft,
        Event::new(
            NotificationType::Product,
            "Product awaiting review",
            format!("{} was submitted for approval", product.name),
        ),
        &[RoleBucket::Admin],
        now,
    );
    Ok(product)
}

/// Edits a shop's own product. Any edit sends it back for review.
pub fn revise_product(
    draft: &mut Draft,
    id: Uuid,
    payload: UpdateProductRequest,
    now: DateTime<Utc>,
) -> AppResult<Product> {
    let shop_id = ensure_shop(&signed_in(draft)?.role())?;
    let name = required_opt("name", payload.name.as_deref())?;
    let category = required_opt("category", payload.category.as_deref())?;
    let price = payload.price.map(validate_price).transpose()?;

    let product = draft
        .products_mut()
        .iter_mut()
        .find(|p| p.id == id)
        .ok_or(AppError::NotFound)?;
    if product.shop_id != shop_id {
        return Err(AppError::Forbidden);
    }

    if let Some(name) = name {
        product.name = name;
    }
    if let Some(category) = category {
        product.category = category;
    }
    if let Some(price) = price {
        product.price = price;
    }
    if let Some(description) = payload.description {
        product.description = Some(description.trim().to_string()).filter(|d| !d.is_empty());
    }
    if let Some(image) = payload.image {
        product.image = Some(image.trim().to_string()).filter(|i| !i.is_empty());
    }
    product.status = ProductStatus::Pending;
    product.rejection_reason = None;
    product.reviewed_at = None;
    let product = product.clone();

    notify(
        draft,
        Event::new(
            NotificationType::Product,
            "Product updated",
            format!("{} was edited and needs another review", product.name),
        ),
        &[RoleBucket::Admin],
        now,
    );
    Ok(product)
}

#[derive(Debug, Clone)]
pub enum Decision {
    Approve,
    Reject { reason: String },
}

pub fn review_product(
    draft: &mut Draft,
    id: Uuid,
    decision: Decision,
    now: DateTime<Utc>,
) -> AppResult<Product> {
    ensure_admin(&signed_in(draft)?.role())?;
    let decision = match decision {
        Decision::Reject { reason } => Decision::Reject {
            reason: required("reason", &reason)?,
        },
        approve => approve,
    };

    let product = draft
        .products_mut()
        .iter_mut()
        .find(|p| p.id == id)
        .ok_or(AppError::NotFound)?;
    match decision {
        Decision::Approve => {
            product.status = ProductStatus::Approved;
            product.rejection_reason = None;
        }
        Decision::Reject { reason } => {
            product.status = ProductStatus::Rejected;
            product.rejection_reason = Some(reason);
        }
    }
    product.reviewed_at = Some(now);
    let product = product.clone();

    let (title, message) = match product.status {
        ProductStatus::Approved => (
            "Product approved",
            format!("{} is now listed in the store", product.name),
        ),
        _ => (
            "Product rejected",
            format!(
                "{} was rejected: {}",
                product.name,
                product.rejection_reason.as_deref().unwrap_or_default()
            ),
        ),
    };
    notify(
        draft,
        Event::new(NotificationType::Product, title, message),
        &[RoleBucket::Shop],
        now,
    );
    Ok(product)
}

/// Role of the caller for read paths; a stale token counts as anonymous.
pub async fn viewer_role(state: &AppState, user: Option<&AuthUser>) -> AppResult<Option<Role>> {
    match user {
        Some(user) => Ok(state.session(user.session_id).await?.map(|s| s.role())),
        None => Ok(None),
    }
}

pub async fn list_products(
    state: &AppState,
    user: Option<&AuthUser>,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let viewer = viewer_role(state, user).await?;
    let (items, meta) = state
        .read(|s| search_catalog(&s.products, viewer.as_ref(), &query))
        .await;
    Ok(ApiResponse::success("Products", ProductList { items }, Some(meta)))
}

pub async fn get_product(
    state: &AppState,
    user: Option<&AuthUser>,
    id: Uuid,
) -> AppResult<ApiResponse<Product>> {
    let viewer = viewer_role(state, user).await?;
    let product = state
        .read(|s| find_visible(&s.products, viewer.as_ref(), id))
        .await?;
    Ok(ApiResponse::success("Product", product, None))
}

pub async fn add_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    let product = state
        .transact(Some(user.session_id), |draft| {
            submit_product(draft, payload, Utc::now())
        })
        .await?;

    tracing::info!(product_id = %product.id, shop_id = %product.shop_id, "product submitted");
    Ok(ApiResponse::success(
        "Product submitted for review",
        product,
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    let product = state
        .transact(Some(user.session_id), |draft| {
            revise_product(draft, id, payload, Utc::now())
        })
        .await?;

    tracing::info!(product_id = %product.id, "product revised");
    Ok(ApiResponse::success("Updated", product, Some(Meta::empty())))
}

pub async fn approve_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Product>> {
    let product = state
        .transact(Some(user.session_id), |draft| {
            review_product(draft, id, Decision::Approve, Utc::now())
        })
        .await?;

    tracing::info!(product_id = %product.id, "product approved");
    Ok(ApiResponse::success("Product approved", product, Some(Meta::empty())))
}

pub async fn reject_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: RejectProductRequest,
) -> AppResult<ApiResponse<Product>> {
    let product = state
        .transact(Some(user.session_id), |draft| {
            review_product(
                draft,
                id,
                Decision::Reject {
                    reason: payload.reason,
                },
                Utc::now(),
            )
        })
        .await?;

    tracing::info!(product_id = %product.id, "product rejected");
    Ok(ApiResponse::success("Product rejected", product, Some(Meta::empty())))
}
