use serde::Serialize;
use utoipa::ToSchema;

use crate::models::{Notification, RoleBucket};

#[derive(Debug, Serialize, ToSchema)]
pub struct NotificationFeed {
    pub role: RoleBucket,
    pub unread: usize,
    pub items: Vec<Notification>,
}
