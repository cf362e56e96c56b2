//! Key-value persistence for the storefront.
//!
//! Every entity collection is stored as one JSON value under a fixed key.
//! Durable keys live in [`Scope::Durable`]; the signed-in user and the cart
//! live in a per-session namespace. A batch passed to [`StoreBackend::apply`]
//! is written all-or-nothing on every backend.

mod memory;
mod postgres;

use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;

use crate::error::AppResult;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Scope {
    Durable,
    Session(Uuid),
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Durable => f.write_str("durable"),
            Scope::Session(id) => write!(f, "session:{id}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StoreKey {
    Products,
    Users,
    Shops,
    Orders,
    Payments,
    Reviews,
    Promotions,
    SupportRequests,
    Notifications,
    CurrentUser,
    Cart,
}

impl StoreKey {
    pub const DURABLE: [StoreKey; 9] = [
        StoreKey::Products,
        StoreKey::Users,
        StoreKey::Shops,
        StoreKey::Orders,
        StoreKey::Payments,
        StoreKey::Reviews,
        StoreKey::Promotions,
        StoreKey::SupportRequests,
        StoreKey::Notifications,
    ];

    pub const SESSION: [StoreKey; 2] = [StoreKey::CurrentUser, StoreKey::Cart];

    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKey::Products => "products",
            StoreKey::Users => "users",
            StoreKey::Shops => "shops",
            StoreKey::Orders => "orders",
            StoreKey::Payments => "payments",
            StoreKey::Reviews => "reviews",
            StoreKey::Promotions => "promotions",
            StoreKey::SupportRequests => "supportRequests",
            StoreKey::Notifications => "notifications",
            StoreKey::CurrentUser => "currentUser",
            StoreKey::Cart => "cart",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Write {
    Put {
        scope: Scope,
        key: StoreKey,
        value: Value,
    },
    Delete {
        scope: Scope,
        key: StoreKey,
    },
}

#[derive(Clone)]
pub enum StoreBackend {
    Memory(MemoryStore),
    Postgres(PgStore),
}

impl StoreBackend {
    pub fn name(&self) -> &'static str {
        match self {
            StoreBackend::Memory(_) => "memory",
            StoreBackend::Postgres(_) => "postgres",
        }
    }

    pub async fn get(&self, scope: Scope, key: StoreKey) -> AppResult<Option<Value>> {
        match self {
            StoreBackend::Memory(store) => Ok(store.get(scope, key).await),
            StoreBackend::Postgres(store) => store.get(scope, key).await,
        }
    }

    /// Reads and decodes one key; a missing key yields `None`.
    pub async fn get_as<T: DeserializeOwned>(
        &self,
        scope: Scope,
        key: StoreKey,
    ) -> AppResult<Option<T>> {
        match self.get(scope, key).await? {
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
            None => Ok(None),
        }
    }

    pub async fn apply(&self, writes: Vec<Write>) -> AppResult<()> {
        if writes.is_empty() {
            return Ok(());
        }
        match self {
            StoreBackend::Memory(store) => store.apply(writes).await,
            StoreBackend::Postgres(store) => store.apply(writes).await,
        }
    }
}

impl From<MemoryStore> for StoreBackend {
    fn from(store: MemoryStore) -> Self {
        StoreBackend::Memory(store)
    }
}

impl From<PgStore> for StoreBackend {
    fn from(store: PgStore) -> Self {
        StoreBackend::Postgres(store)
    }
}
