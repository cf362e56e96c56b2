use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    dto::reviews::{CreateReviewRequest, ReviewList},
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Review, Role},
    response::{ApiResponse, Meta},
    services::{
        cart_service::ensure_shopper,
        product_service::{can_view, viewer_role},
        required,
    },
    state::AppState,
    storefront::{Draft, Storefront},
};

pub fn write_review(
    draft: &mut Draft,
    product_id: Uuid,
    payload: CreateReviewRequest,
    now: DateTime<Utc>,
) -> AppResult<Review> {
    ensure_shopper(draft.session())?;
    let user_id = draft
        .session()
        .map(|s| s.user.user_id)
        .ok_or(AppError::Unauthenticated)?;

    let product = draft
        .storefront()
        .product(product_id)
        .ok_or(AppError::NotFound)?;
    if !can_view(product, Some(&Role::Customer)) {
        return Err(AppError::NotFound);
    }
    if !(1..=5).contains(&payload.rating) {
        return Err(AppError::validation("rating must be between 1 and 5"));
    }

    let review = Review {
        id: Uuid::new_v4(),
        product_id,
        user_id,
        rating: payload.rating,
        comment: required("comment", &payload.comment)?,
        created_at: now,
    };
    draft.reviews_mut().push(review.clone());
    Ok(review)
}

/// Reviews of a product, newest first, with their mean rating.
pub fn reviews_for(storefront: &Storefront, product_id: Uuid) -> ReviewList {
    let mut items: Vec<Review> = storefront
        .reviews
        .iter()
        .filter(|r| r.product_id == product_id)
        .cloned()
        .collect();
    items.sort_by_key(|r| std::cmp::Reverse(r.created_at));

    let average_rating = (!items.is_empty()).then(|| {
        let sum: u32 = items.iter().map(|r| u32::from(r.rating)).sum();
        f64::from(sum) / items.len() as f64
    });
    ReviewList {
        average_rating,
        items,
    }
}

pub async fn add_review(
    state: &AppState,
    user: &AuthUser,
    product_id: Uuid,
    payload: CreateReviewRequest,
) -> AppResult<ApiResponse<Review>> {
    let review = state
        .transact(Some(user.session_id), |draft| {
            write_review(draft, product_id, payload, Utc::now())
        })
        .await?;

    tracing::info!(
        review_id = %review.id,
        product_id = %review.product_id,
        rating = review.rating,
        "review added"
    );
    Ok(ApiResponse::success("Review added", review, Some(Meta::empty())))
}

pub async fn list_reviews(
    state: &AppState,
    user: Option<&AuthUser>,
    product_id: Uuid,
) -> AppResult<ApiResponse<ReviewList>> {
    let viewer = viewer_role(state, user).await?;
    let reviews = state
        .read(|s| {
            s.product(product_id)
                .filter(|p| can_view(p, viewer.as_ref()))
                .map(|_| reviews_for(s, product_id))
        })
        .await
        .ok_or(AppError::NotFound)?;

    let total = reviews.items.len();
    Ok(ApiResponse::success("Reviews", reviews, Some(Meta::total(total))))
}
