use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{CartLine, Role, User, cart_total},
    store::{Scope, StoreBackend, StoreKey},
};

/// Snapshot of the signed-in account, stored under `currentUser`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub email: String,
    pub name: Option<String>,
    #[serde(flatten)]
    pub role: Role,
    pub signed_in_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user: SessionUser,
    pub cart: Vec<CartLine>,
}

impl Session {
    pub fn start(user: &User, now: DateTime<Utc>) -> Self {
        Self {
            user: SessionUser {
                session_id: Uuid::new_v4(),
                user_id: user.id,
                email: user.email.clone(),
                name: user.name.clone(),
                role: user.role,
                signed_in_at: now,
            },
            cart: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.user.session_id
    }

    pub fn role(&self) -> Role {
        self.user.role
    }

    pub fn scope(&self) -> Scope {
        Scope::Session(self.id())
    }

    pub fn cart_total(&self) -> Option<i64> {
        cart_total(&self.cart)
    }

    /// Refreshes the stored account snapshot after a profile edit.
    pub fn refresh_user(&mut self, user: &User) {
        self.user.email = user.email.clone();
        self.user.name = user.name.clone();
        self.user.role = user.role;
    }

    pub async fn load(store: &StoreBackend, id: Uuid) -> AppResult<Option<Session>> {
        let scope = Scope::Session(id);
        let Some(user) = store.get_as::<SessionUser>(scope, StoreKey::CurrentUser).await? else {
            return Ok(None);
        };
        let cart = store
            .get_as::<Vec<CartLine>>(scope, StoreKey::Cart)
            .await?
            .unwrap_or_default();
        Ok(Some(Session { user, cart }))
    }
}
