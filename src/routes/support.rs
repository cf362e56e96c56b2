use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use uuid::Uuid;

use crate::{
    dto::support::{SupportRequestList, SupportRequestPayload},
    error::AppResult,
    middleware::auth::AuthUser,
    models::SupportRequest,
    response::ApiResponse,
    routes::params::SupportQuery,
    services::support_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(submit).get(list))
        .route("/{id}/resolve", post(resolve))
}

#[utoipa::path(
    post,
    path = "/api/support",
    request_body = SupportRequestPayload,
    responses(
        (status = 200, description = "Request recorded and admins notified", body = ApiResponse<SupportRequest>),
        (status = 400, description = "Missing field")
    ),
    tag = "Support"
)]
pub async fn submit(
    State(state): State<AppState>,
    user: Option<AuthUser>,
    Json(payload): Json<SupportRequestPayload>,
) -> AppResult<Json<ApiResponse<SupportRequest>>> {
    let resp = support_service::submit_request(&state, user.as_ref(), payload).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/support",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 20"),
        ("status" = Option<String>, Query, description = "open, resolved")
    ),
    responses(
        (status = 200, description = "Support requests (admin only)", body = ApiResponse<SupportRequestList>),
        (status = 403, description = "Forbidden")
    ),
    security(("bearer_auth" = [])),
    tag = "Support"
)]
pub async fn list(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<SupportQuery>,
) -> AppResult<Json<ApiResponse<SupportRequestList>>> {
    let resp = support_service::list_requests(&state, &user, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    post,
    path = "/api/support/{id}/resolve",
    params(
        ("id" = Uuid, Path, description = "Support request ID")
    ),
    responses(
        (status = 200, description = "Marked resolved", body = ApiResponse<SupportRequest>),
        (status = 403, description = "Forbidden"),
        (status = 404, description = "Not Found")
    ),
    security(("bearer_auth" = [])),
    tag = "Support"
)]
pub async fn resolve(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<SupportRequest>>> {
    let resp = support_service::mark_resolved(&state, &user, id).await?;
    Ok(Json(resp))
}
