use crate::{
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    session::Session,
    state::AppState,
    storefront::Draft,
};

pub mod admin_service;
pub mod auth_service;
pub mod cart_service;
pub mod notification_service;
pub mod order_service;
pub mod product_service;
pub mod promotion_service;
pub mod review_service;
pub mod shop_service;
pub mod support_service;

/// The caller's live session, or `Unauthenticated` once it was ended.
pub async fn current_session(state: &AppState, user: &AuthUser) -> AppResult<Session> {
    state
        .session(user.session_id)
        .await?
        .ok_or(AppError::Unauthenticated)
}

/// Same as [`current_session`] for code already running inside a draft.
pub(crate) fn signed_in(draft: &Draft) -> AppResult<&Session> {
    draft.session().ok_or(AppError::Unauthenticated)
}

/// Trims `value` and rejects it when nothing is left.
pub(crate) fn required(field: &str, value: &str) -> AppResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(AppError::Validation(format!("{field} is required")));
    }
    Ok(value.to_string())
}

/// Like [`required`] for optional patch fields.
pub(crate) fn required_opt(field: &str, value: Option<&str>) -> AppResult<Option<String>> {
    value.map(|v| required(field, v)).transpose()
}
