//! The whole application state and the draft mutations run against.
//!
//! Operations never touch the live [`Storefront`] directly. They receive a
//! [`Draft`], a private copy plus the caller's session, and every collection
//! they borrow mutably is recorded. Committing the draft turns those records
//! into one store batch (see `AppState::transact`).

use std::collections::BTreeSet;

use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{
        NotificationBuckets, Order, Payment, Product, Promotion, Review, Shop, SupportRequest,
        User,
    },
    session::Session,
    store::{Scope, StoreBackend, StoreKey, Write},
};

#[derive(Debug, Clone, Default)]
pub struct Storefront {
    pub products: Vec<Product>,
    pub users: Vec<User>,
    pub shops: Vec<Shop>,
    pub orders: Vec<Order>,
    pub payments: Vec<Payment>,
    pub reviews: Vec<Review>,
    pub promotions: Vec<Promotion>,
    pub support_requests: Vec<SupportRequest>,
    pub notifications: NotificationBuckets,
}

impl Storefront {
    /// Loads every durable key; missing keys start empty.
    pub async fn load(store: &StoreBackend) -> AppResult<Self> {
        let durable = Scope::Durable;
        Ok(Self {
            products: store.get_as(durable, StoreKey::Products).await?.unwrap_or_default(),
            users: store.get_as(durable, StoreKey::Users).await?.unwrap_or_default(),
            shops: store.get_as(durable, StoreKey::Shops).await?.unwrap_or_default(),
            orders: store.get_as(durable, StoreKey::Orders).await?.unwrap_or_default(),
            payments: store.get_as(durable, StoreKey::Payments).await?.unwrap_or_default(),
            reviews: store.get_as(durable, StoreKey::Reviews).await?.unwrap_or_default(),
            promotions: store.get_as(durable, StoreKey::Promotions).await?.unwrap_or_default(),
            support_requests: store
                .get_as(durable, StoreKey::SupportRequests)
                .await?
                .unwrap_or_default(),
            notifications: store
                .get_as(durable, StoreKey::Notifications)
                .await?
                .unwrap_or_default(),
        })
    }

    fn encode(&self, key: StoreKey) -> AppResult<Option<serde_json::Value>> {
        fn to_value<T: Serialize>(value: &T) -> AppResult<Option<serde_json::Value>> {
            Ok(Some(serde_json::to_value(value)?))
        }
        match key {
            StoreKey::Products => to_value(&self.products),
            StoreKey::Users => to_value(&self.users),
            StoreKey::Shops => to_value(&self.shops),
            StoreKey::Orders => to_value(&self.orders),
            StoreKey::Payments => to_value(&self.payments),
            StoreKey::Reviews => to_value(&self.reviews),
            StoreKey::Promotions => to_value(&self.promotions),
            StoreKey::SupportRequests => to_value(&self.support_requests),
            StoreKey::Notifications => to_value(&self.notifications),
            StoreKey::CurrentUser | StoreKey::Cart => Ok(None),
        }
    }

    pub fn product(&self, id: Uuid) -> Option<&Product> {
        self.products.iter().find(|p| p.id == id)
    }

    pub fn user(&self, id: Uuid) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    /// `email` must already be normalized.
    pub fn user_by_email(&self, email: &str) -> Option<&User> {
        self.users.iter().find(|u| u.email.eq_ignore_ascii_case(email))
    }

    pub fn shop(&self, id: Uuid) -> Option<&Shop> {
        self.shops.iter().find(|s| s.id == id)
    }

    pub fn order(&self, id: Uuid) -> Option<&Order> {
        self.orders.iter().find(|o| o.id == id)
    }

    pub fn payments_for_order(&self, order_id: Uuid) -> Vec<Payment> {
        self.payments
            .iter()
            .filter(|p| p.order_id == order_id)
            .cloned()
            .collect()
    }
}

pub struct Draft {
    storefront: Storefront,
    session: Option<Session>,
    session_dirty: bool,
    ended_sessions: Vec<Uuid>,
    dirty: BTreeSet<StoreKey>,
}

impl Draft {
    pub fn new(storefront: Storefront, session: Option<Session>) -> Self {
        Self {
            storefront,
            session,
            session_dirty: false,
            ended_sessions: Vec::new(),
            dirty: BTreeSet::new(),
        }
    }

    pub fn storefront(&self) -> &Storefront {
        &self.storefront
    }

    pub fn products_mut(&mut self) -> &mut Vec<Product> {
        self.dirty.insert(StoreKey::Products);
        &mut self.storefront.products
    }

    pub fn users_mut(&mut self) -> &mut Vec<User> {
        self.dirty.insert(StoreKey::Users);
        &mut self.storefront.users
    }

    pub fn shops_mut(&mut self) -> &mut Vec<Shop> {
        self.dirty.insert(StoreKey::Shops);
        &mut self.storefront.shops
    }

    pub fn orders_mut(&mut self) -> &mut Vec<Order> {
        self.dirty.insert(StoreKey::Orders);
        &mut self.storefront.orders
    }

    pub fn payments_mut(&mut self) -> &mut Vec<Payment> {
        self.dirty.insert(StoreKey::Payments);
        &mut self.storefront.payments
    }

    pub fn reviews_mut(&mut self) -> &mut Vec<Review> {
        self.dirty.insert(StoreKey::Reviews);
        &mut self.storefront.reviews
    }

    pub fn promotions_mut(&mut self) -> &mut Vec<Promotion> {
        self.dirty.insert(StoreKey::Promotions);
        &mut self.storefront.promotions
    }

    pub fn support_requests_mut(&mut self) -> &mut Vec<SupportRequest> {
        self.dirty.insert(StoreKey::SupportRequests);
        &mut self.storefront.support_requests
    }

    pub fn notifications_mut(&mut self) -> &mut NotificationBuckets {
        self.dirty.insert(StoreKey::Notifications);
        &mut self.storefront.notifications
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn session_mut(&mut self) -> Option<&mut Session> {
        if self.session.is_some() {
            self.session_dirty = true;
        }
        self.session.as_mut()
    }

    /// Replaces the caller's session; the previous one, if any, is ended.
    pub fn start_session(&mut self, session: Session) {
        self.end_session();
        self.session = Some(session);
        self.session_dirty = true;
    }

    pub fn end_session(&mut self) -> Option<Session> {
        let ended = self.session.take()?;
        self.ended_sessions.push(ended.id());
        self.session_dirty = false;
        Some(ended)
    }

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty() || self.session_dirty || !self.ended_sessions.is_empty()
    }

    /// The batch that makes the store match this draft.
    pub fn writes(&self) -> AppResult<Vec<Write>> {
        let mut writes = Vec::new();
        for key in &self.dirty {
            if let Some(value) = self.storefront.encode(*key)? {
                writes.push(Write::Put {
                    scope: Scope::Durable,
                    key: *key,
                    value,
                });
            }
        }
        for id in &self.ended_sessions {
            for key in StoreKey::SESSION {
                writes.push(Write::Delete {
                    scope: Scope::Session(*id),
                    key,
                });
            }
        }
        if self.session_dirty {
            if let Some(session) = &self.session {
                writes.push(Write::Put {
                    scope: session.scope(),
                    key: StoreKey::CurrentUser,
                    value: serde_json::to_value(&session.user)?,
                });
                writes.push(Write::Put {
                    scope: session.scope(),
                    key: StoreKey::Cart,
                    value: serde_json::to_value(&session.cart)?,
                });
            }
        }
        Ok(writes)
    }

    pub fn into_parts(self) -> (Storefront, Option<Session>) {
        (self.storefront, self.session)
    }
}
