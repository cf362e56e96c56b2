use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    dto::support::{SupportRequestList, SupportRequestPayload},
    error::{AppError, AppResult},
    middleware::auth::{AuthUser, ensure_admin},
    models::{NotificationType, RoleBucket, SupportRequest, SupportStatus},
    response::{ApiResponse, Meta},
    routes::params::SupportQuery,
    services::{
        auth_service::normalize_email,
        current_session,
        notification_service::{Event, notify},
        required, signed_in,
    },
    state::AppState,
    storefront::Draft,
};

/// Records a support request from anyone, signed in or not.
pub fn open_request(
    draft: &mut Draft,
    payload: SupportRequestPayload,
    now: DateTime<Utc>,
) -> AppResult<SupportRequest> {
    let request = SupportRequest {
        id: Uuid::new_v4(),
        user_id: draft.session().map(|s| s.user.user_id),
        name: required("name", &payload.name)?,
        email: normalize_email(&required("email", &payload.email)?),
        subject: required("subject", &payload.subject)?,
        message: required("message", &payload.message)?,
        status: SupportStatus::Open,
        created_at: now,
        resolved_at: None,
    };
    draft.support_requests_mut().push(request.clone());

    notify(
        draft,
        Event::new(
            NotificationType::Support,
            "New support request",
            format!("{} wrote: {}", request.name, request.subject),
        ),
        &[RoleBucket::Admin],
        now,
    );
    Ok(request)
}

/// Marks a request resolved. Resolving twice keeps the first timestamp.
pub fn resolve_request(draft: &mut Draft, id: Uuid, now: DateTime<Utc>) -> AppResult<SupportRequest> {
    ensure_admin(&signed_in(draft)?.role())?;
    let request = draft
        .support_requests_mut()
        .iter_mut()
        .find(|r| r.id == id)
        .ok_or(AppError::NotFound)?;
    request.status = SupportStatus::Resolved;
    request.resolved_at.get_or_insert(now);
    Ok(request.clone())
}

pub async fn submit_request(
    state: &AppState,
    user: Option<&AuthUser>,
    payload: SupportRequestPayload,
) -> AppResult<ApiResponse<SupportRequest>> {
    let request = state
        .transact(user.map(|u| u.session_id), |draft| {
            open_request(draft, payload, Utc::now())
        })
        .await?;

    tracing::info!(request_id = %request.id, signed_in = request.user_id.is_some(), "support request opened");
    Ok(ApiResponse::success(
        "Support request sent",
        request,
        Some(Meta::empty()),
    ))
}

pub async fn list_requests(
    state: &AppState,
    user: &AuthUser,
    query: SupportQuery,
) -> AppResult<ApiResponse<SupportRequestList>> {
    ensure_admin(&current_session(state, user).await?.role())?;
    let (items, meta) = state
        .read(|s| {
            let mut items: Vec<SupportRequest> = s
                .support_requests
                .iter()
                .filter(|r| query.status.is_none_or(|status| r.status == status))
                .cloned()
                .collect();
            items.sort_by_key(|r| std::cmp::Reverse(r.created_at));
            query.pagination().apply(items)
        })
        .await;
    Ok(ApiResponse::success(
        "Support requests",
        SupportRequestList { items },
        Some(meta),
    ))
}

pub async fn mark_resolved(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<SupportRequest>> {
    let request = state
        .transact(Some(user.session_id), |draft| resolve_request(draft, id, Utc::now()))
        .await?;

    tracing::info!(request_id = %request.id, "support request resolved");
    Ok(ApiResponse::success("Resolved", request, Some(Meta::empty())))
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

    fn payload() -> SupportRequestPayload {
        SupportRequestPayload {
            name: "Ana".into(),
            email: " Ana@Example.com ".into(),
            subject: "Late parcel".into(),
            message: "Still waiting".into(),
        }
    }

    fn admin_session() -> Session {
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
        Session::start(&admin, Utc::now())
    }

    #[test]
    fn anonymous_request_notifies_admin() {
        let mut draft = Draft::new(Storefront::default(), None);
        let request = open_request(&mut draft, payload(), Utc::now()).unwrap();

        assert_eq!(request.user_id, None);
        assert_eq!(request.email, "ana@example.com");
        assert_eq!(request.status, SupportStatus::Open);
        assert_eq!(draft.storefront().notifications.admin.len(), 1);
    }

    #[test]
    fn blank_fields_are_rejected() {
        let mut draft = Draft::new(Storefront::default(), None);
        let blank = SupportRequestPayload {
            subject: " ".into(),
            ..payload()
        };
        assert!(matches!(
            open_request(&mut draft, blank, Utc::now()),
            Err(AppError::Validation(_))
        ));
        assert!(!draft.is_dirty());
    }

    #[test]
    fn resolving_sets_timestamp_once() {
        let mut anonymous = Draft::new(Storefront::default(), None);
        let request = open_request(&mut anonymous, payload(), Utc::now()).unwrap();
        let (storefront, _) = anonymous.into_parts();

        let mut draft = Draft::new(storefront, Some(admin_session()));
        let first = Utc::now();
        let resolved = resolve_request(&mut draft, request.id, first).unwrap();
        assert_eq!(resolved.resolved_at, Some(first));

        let again = resolve_request(&mut draft, request.id, first + Duration::hours(1)).unwrap();
        assert_eq!(again.resolved_at, Some(first));
    }
}
