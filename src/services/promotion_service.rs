use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    dto::promotions::{CreatePromotionRequest, PromotionList},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{Promotion, PromotionStatus, PromotionType},
    response::{ApiResponse, Meta},
    services::{current_session, required, signed_in},
    state::AppState,
    storefront::Draft,
};

pub fn validate_promotion(payload: &CreatePromotionRequest) -> AppResult<()> {
    if payload.value <= 0 {
        return Err(AppError::validation("value must be greater than 0"));
    }
    if payload.kind == PromotionType::Percentage && payload.value > 100 {
        return Err(AppError::validation("percentage cannot exceed 100"));
    }
    if payload.min_order_value < 0 || payload.max_discount.is_some_and(|m| m <= 0) {
        return Err(AppError::validation("order limits must be positive"));
    }
    if payload.start_date >= payload.end_date {
        return Err(AppError::validation("start_date must be before end_date"));
    }
    Ok(())
}

pub fn create(
    draft: &mut Draft,
    payload: CreatePromotionRequest,
    now: DateTime<Utc>,
) -> AppResult<Promotion> {
    ensure_admin(&signed_in(draft)?.role())?;
    let name = required("name", &payload.name)?;
    validate_promotion(&payload)?;

    let promotion = Promotion {
        id: Uuid::new_v4(),
        name,
        kind: payload.kind,
        value: payload.value,
        min_order_value: payload.min_order_value,
        max_discount: payload.max_discount,
        start_date: payload.start_date,
        end_date: payload.end_date,
        status: PromotionStatus::Active,
        usage_count: 0,
        max_usage: payload.max_usage,
        applicable_products: payload.applicable_products,
        applicable_users: payload.applicable_users,
    };
    draft.promotions_mut().push(promotion.clone());
    tracing::debug!(promotion_id = %promotion.id, running = promotion.is_running(now), "promotion stored");
    Ok(promotion)
}

pub fn running_at(promotions: &[Promotion], now: DateTime<Utc>) -> Vec<Promotion> {
    promotions
        .iter()
        .filter(|p| p.is_running(now))
        .cloned()
        .collect()
}

pub async fn active_promotions(state: &AppState) -> AppResult<ApiResponse<PromotionList>> {
    let now = Utc::now();
    let items = state.read(|s| running_at(&s.promotions, now)).await;
    let total = items.len();
    Ok(ApiResponse::success(
        "Promotions",
        PromotionList { items },
        Some(Meta::total(total)),
    ))
}

pub async fn all_promotions(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<PromotionList>> {
    ensure_admin(&current_session(state, user).await?.role())?;
    let items = state.read(|s| s.promotions.clone()).await;
    let total = items.len();
    Ok(ApiResponse::success(
        "Promotions",
        PromotionList { items },
        Some(Meta::total(total)),
    ))
}

pub async fn create_promotion(
    state: &AppState,
    user: &AuthUser,
    payload: CreatePromotionRequest,
) -> AppResult<ApiResponse<Promotion>> {
    let promotion = state
        .transact(Some(user.session_id), |draft| create(draft, payload, Utc::now()))
        .await?;

    tracing::info!(promotion_id = %promotion.id, kind = ?promotion.kind, "promotion created");
    Ok(ApiResponse::success(
        "Promotion created",
        promotion,
        Some(Meta::empty()),
    ))
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::{
        models::{Role, User},
        session::Session,
        storefront::Storefront,
    };

    fn request(kind: PromotionType, value: i64) -> CreatePromotionRequest {
        let now = Utc::now();
        CreatePromotionRequest {
            name: "Spring sale".into(),
            kind,
            value,
            min_order_value: 0,
            max_discount: None,
            start_date: now - Duration::days(1),
            end_date: now + Duration::days(6),
            max_usage: None,
            applicable_products: vec![],
            applicable_users: vec![],
        }
    }

    fn admin_draft() -> Draft {
        let admin = User {
            id: Uuid::new_v4(),
            email: "admin@example.com".into(),
            password_hash: String::new(),
            role: Role::Admin,
            name: None,
            phone: None,
            address: None,
            created_at: Utc::now(),
        };
        Draft::new(Storefront::default(), Some(Session::start(&admin, Utc::now())))
    }

    #[test]
    fn validation_rules() {
        assert!(validate_promotion(&request(PromotionType::Percentage, 20)).is_ok());
        assert!(validate_promotion(&request(PromotionType::Fixed, 50_000)).is_ok());
        assert!(validate_promotion(&request(PromotionType::Percentage, 101)).is_err());
        assert!(validate_promotion(&request(PromotionType::Fixed, 0)).is_err());

        let mut inverted = request(PromotionType::Fixed, 10);
        inverted.end_date = inverted.start_date;
        assert!(validate_promotion(&inverted).is_err());
    }

    #[test]
    fn created_promotion_is_active_and_unused() {
        let mut draft = admin_draft();
        let promotion = create(&mut draft, request(PromotionType::Freeship, 1), Utc::now()).unwrap();
        assert_eq!(promotion.status, PromotionStatus::Active);
        assert_eq!(promotion.usage_count, 0);
        assert_eq!(running_at(&draft.storefront().promotions, Utc::now()).len(), 1);
    }

    #[test]
    fn expired_promotions_are_not_running() {
        let mut draft = admin_draft();
        let mut past = request(PromotionType::Fixed, 10);
        past.start_date = Utc::now() - Duration::days(10);
        past.end_date = Utc::now() - Duration::days(3);
        create(&mut draft, past, Utc::now()).unwrap();
        assert!(running_at(&draft.storefront().promotions, Utc::now()).is_empty());
    }
}
