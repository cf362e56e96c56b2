use axum::{
    Json, Router,
    extract::State,
    routing::get,
};

use crate::{
    dto::promotions::{CreatePromotionRequest, PromotionList},
    error::AppResult,
    middleware::auth::AuthUser,
    models::Promotion,
    response::ApiResponse,
    services::promotion_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_active))
        .route("/all", get(list_all).post(create))
}

#[utoipa::path(
    get,
    path = "/api/promotions",
    responses(
        (status = 200, description = "Promotions running now", body = ApiResponse<PromotionList>)
    ),
    tag = "Promotions"
)]
pub async fn list_active(
    State(state): State<AppState>,
) -> AppResult<Json<ApiResponse<PromotionList>>> {
    let resp = promotion_service::active_promotions(&state).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/promotions/all",
    responses(
        (status = 200, description = "Every promotion (admin only)", body = ApiResponse<PromotionList>),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Promotions"
)]
pub async fn list_all(
    State(state): State<AppState>,
    user: AuthUser,
) -> AppResult<Json<ApiResponse<PromotionList>>> {
    let resp = promotion_service::all_promotions(&state, &user).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/promotions/all",
    request_body = CreatePromotionRequest,
    responses(
        (status = 200, description = "Promotion created", body = ApiResponse<Promotion>),
        (status = 400, description = "Invalid promotion"),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Promotions"
)]
pub async fn create(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreatePromotionRequest>,
) -> AppResult<Json<ApiResponse<Promotion>>> {
    let resp = promotion_service::create_promotion(&state, &user, payload).await?;
    Ok(Json(resp))
}
