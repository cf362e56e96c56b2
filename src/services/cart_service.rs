use uuid::Uuid;

use crate::{
    dto::cart::{AddToCartRequest, CartView, UpdateQuantityRequest},
    error::{AppError, AppResult, Guard},
    middleware::auth::AuthUser,
    models::{CartLine, MAX_LINE_QUANTITY, Product, cart_total},
    response::ApiResponse,
    services::{current_session, signed_in},
    session::Session,
    state::AppState,
};

/// Only a signed-in customer may hold a cart.
pub fn ensure_shopper(session: Option<&Session>) -> AppResult<()> {
    let session = session.ok_or(AppError::GuardViolation(Guard::SessionMissing))?;
    if !session.role().is_customer() {
        return Err(AppError::GuardViolation(Guard::WrongRole));
    }
    Ok(())
}

/// Adds `quantity` of `product`, merging into an existing line for the same product.
pub fn add_line(session: Option<&mut Session>, product: &Product, quantity: i64) -> AppResult<()> {
    ensure_shopper(session.as_deref())?;
    if !product.is_approved() {
        return Err(AppError::GuardViolation(Guard::NotApproved));
    }
    if quantity < 1 {
        return Err(AppError::validation("quantity must be greater than 0"));
    }
    let Some(session) = session else {
        return Err(AppError::GuardViolation(Guard::SessionMissing));
    };

    let mut cart = session.cart.clone();
    match cart.iter_mut().find(|line| line.product_id == product.id) {
        Some(line) => {
            line.quantity = line
                .quantity
                .checked_add(quantity)
                .filter(|q| *q <= MAX_LINE_QUANTITY)
                .ok_or_else(quantity_too_large)?;
        }
        None if quantity > MAX_LINE_QUANTITY => return Err(quantity_too_large()),
        None => cart.push(CartLine::from_product(product, quantity)),
    }
    ensure_priceable(&cart)?;
    session.cart = cart;
    Ok(())
}

fn quantity_too_large() -> AppError {
    AppError::validation(format!("quantity cannot exceed {MAX_LINE_QUANTITY}"))
}

fn ensure_priceable(cart: &[CartLine]) -> AppResult<()> {
    match cart_total(cart) {
        Some(_) => Ok(()),
        None => Err(AppError::validation("cart total is too large")),
    }
}

/// Sets the line's quantity exactly. Quantities below 1 and unknown products are ignored.
pub fn set_line_quantity(
    cart: &mut [CartLine],
    product_id: Uuid,
    quantity: i64,
) -> AppResult<bool> {
    if quantity < 1 {
        return Ok(false);
    }
    if quantity > MAX_LINE_QUANTITY {
        return Err(quantity_too_large());
    }
    let Some(index) = cart.iter().position(|line| line.product_id == product_id) else {
        return Ok(false);
    };
    let previous = cart[index].quantity;
    if previous == quantity {
        return Ok(false);
    }

    cart[index].quantity = quantity;
    if let Err(err) = ensure_priceable(cart) {
        cart[index].quantity = previous;
        return Err(err);
    }
    Ok(true)
}

pub fn remove_line(cart: &mut Vec<CartLine>, product_id: Uuid) -> bool {
    let before = cart.len();
    cart.retain(|line| line.product_id != product_id);
    cart.len() != before
}

pub async fn get_cart(state: &AppState, user: &AuthUser) -> AppResult<ApiResponse<CartView>> {
    let session = current_session(state, user).await?;
    Ok(ApiResponse::success("OK", CartView::from(&session), None))
}

/// `user` is optional so a visitor without a session gets the guard message.
pub async fn add_to_cart(
    state: &AppState,
    user: Option<&AuthUser>,
    payload: AddToCartRequest,
) -> AppResult<ApiResponse<CartView>> {
    let cart = state
        .transact(user.map(|u| u.session_id), |draft| {
            ensure_shopper(draft.session())?;
            let product = draft
                .storefront()
                .product(payload.product_id)
                .cloned()
                .ok_or(AppError::NotFound)?;
            add_line(draft.session_mut(), &product, payload.quantity)?;
            Ok(CartView::from(signed_in(draft)?))
        })
        .await?;

    tracing::info!(
        product_id = %payload.product_id,
        quantity = payload.quantity,
        "cart updated"
    );
    Ok(ApiResponse::success("Added to cart", cart, None))
}

pub async fn update_quantity(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    payload: UpdateQuantityRequest,
) -> AppResult<ApiResponse<CartView>> {
    let cart = state
        .transact(Some(user.session_id), |draft| {
            let session = signed_in(draft)?;
            let mut cart = session.cart.clone();
            if set_line_quantity(&mut cart, product_id, payload.quantity)? {
                if let Some(session) = draft.session_mut() {
                    session.cart = cart;
                }
            }
            Ok(CartView::from(signed_in(draft)?))
        })
        .await?;
    Ok(ApiResponse::success("OK", cart, None))
}

pub async fn remove_from_cart(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
) -> AppResult<ApiResponse<CartView>> {
    let cart = state
        .transact(Some(user.session_id), |draft| {
            let session = signed_in(draft)?;
            let mut cart = session.cart.clone();
            if remove_line(&mut cart, product_id) {
                if let Some(session) = draft.session_mut() {
                    session.cart = cart;
                }
                tracing::info!(product_id = %product_id, "removed from cart");
            }
            Ok(CartView::from(signed_in(draft)?))
        })
        .await?;
    Ok(ApiResponse::success("Removed from cart", cart, None))
}
