use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    dto::notifications::NotificationFeed,
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{Notification, NotificationType, Priority, RoleBucket},
    response::{ApiResponse, Meta},
    services::{current_session, signed_in},
    state::AppState,
    storefront::Draft,
};

/// Something worth telling a role about.
#[derive(Debug, Clone)]
pub struct Event {
    pub kind: NotificationType,
    pub title: String,
    pub message: String,
    pub priority: Priority,
}

impl Event {
    pub fn new(kind: NotificationType, title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            message: message.into(),
            priority: Priority::Normal,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

/// Appends one unread notification to every target bucket.
pub fn notify(draft: &mut Draft, event: Event, targets: &[RoleBucket], now: DateTime<Utc>) {
    let buckets = draft.notifications_mut();
    for role in targets {
        buckets.bucket_mut(*role).push(Notification {
            id: Uuid::new_v4(),
            title: event.title.clone(),
            message: event.message.clone(),
            kind: event.kind,
            priority: event.priority,
            is_read: false,
            created_at: now,
        });
    }
    tracing::debug!(title = %event.title, targets = ?targets, "notification fanned out");
}

/// Read state is shared by everyone in the role.
pub fn mark_read(draft: &mut Draft, role: RoleBucket, id: Uuid) -> AppResult<Notification> {
    let notification = draft
        .notifications_mut()
        .bucket_mut(role)
        .iter_mut()
        .find(|n| n.id == id)
        .ok_or(AppError::NotFound)?;
    notification.is_read = true;
    Ok(notification.clone())
}

pub fn mark_all_read(draft: &mut Draft, role: RoleBucket) -> usize {
    let mut changed = 0;
    for notification in draft.notifications_mut().bucket_mut(role).iter_mut() {
        if !notification.is_read {
            notification.is_read = true;
            changed += 1;
        }
    }
    changed
}

pub async fn notifications_for_role(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<NotificationFeed>> {
    let role = current_session(state, user).await?.role().bucket();
    let mut items = state
        .read(|s| s.notifications.bucket(role).clone())
        .await;
    items.reverse();
    let unread = items.iter().filter(|n| !n.is_read).count();
    let total = items.len();

    Ok(ApiResponse::success(
        "Notifications",
        NotificationFeed {
            role,
            unread,
            items,
        },
        Some(Meta::total(total)),
    ))
}

pub async fn read_notification(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<Notification>> {
    let notification = state
        .transact(Some(user.session_id), |draft| {
            let role = signed_in(draft)?.role().bucket();
            mark_read(draft, role, id)
        })
        .await?;
    Ok(ApiResponse::success("Marked as read", notification, None))
}

pub async fn read_all_notifications(
    state: &AppState,
    user: &AuthUser,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let changed = state
        .transact(Some(user.session_id), |draft| {
            let role = signed_in(draft)?.role().bucket();
            Ok(mark_all_read(draft, role))
        })
        .await?;
    Ok(ApiResponse::success(
        "Marked all as read",
        serde_json::json!({ "updated": changed }),
        Some(Meta::empty()),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storefront::Storefront;

    fn event() -> Event {
        Event::new(NotificationType::Order, "New order", "Order #1 placed")
    }

    #[test]
    fn notify_appends_one_per_target_bucket() {
        let mut draft = Draft::new(Storefront::default(), None);
        notify(
            &mut draft,
            event(),
            &[RoleBucket::Admin, RoleBucket::Shop],
            Utc::now(),
        );

        let buckets = &draft.storefront().notifications;
        assert_eq!(buckets.admin.len(), 1);
        assert_eq!(buckets.shop.len(), 1);
        assert!(buckets.customer.is_empty());
        assert!(!buckets.shop[0].is_read);
        assert_ne!(buckets.admin[0].id, buckets.shop[0].id);
    }

    #[test]
    fn marking_read_is_scoped_to_the_bucket() {
        let mut draft = Draft::new(Storefront::default(), None);
        notify(&mut draft, event(), &[RoleBucket::Shop], Utc::now());
        let id = draft.storefront().notifications.shop[0].id;

        assert!(matches!(
            mark_read(&mut draft, RoleBucket::Customer, id),
            Err(AppError::NotFound)
        ));
        assert!(mark_read(&mut draft, RoleBucket::Shop, id).unwrap().is_read);
    }

    #[test]
    fn mark_all_read_counts_only_unread() {
        let mut draft = Draft::new(Storefront::default(), None);
        notify(&mut draft, event(), &[RoleBucket::Admin], Utc::now());
        notify(&mut draft, event(), &[RoleBucket::Admin], Utc::now());
        assert_eq!(mark_all_read(&mut draft, RoleBucket::Admin), 2);
        assert_eq!(mark_all_read(&mut draft, RoleBucket::Admin), 0);
    }
}
