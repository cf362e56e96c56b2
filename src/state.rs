use std::sync::Arc;

use tokio::sync::Mutex;
use uuid::Uuid;

use crate::{
    config::AppConfig,
    db::{MIGRATIONS_DIR, create_orm_conn, run_migrations},
    error::AppResult,
    session::Session,
    store::{MemoryStore, PgStore, StoreBackend},
    storefront::{Draft, Storefront},
};

#[derive(Clone)]
pub struct AppState {
    pub store: StoreBackend,
    pub config: Arc<AppConfig>,
    storefront: Arc<Mutex<Storefront>>,
}

impl AppState {
    pub async fn new(store: StoreBackend, config: AppConfig) -> AppResult<Self> {
        let storefront = Storefront::load(&store).await?;
        tracing::info!(
            backend = store.name(),
            products = storefront.products.len(),
            users = storefront.users.len(),
            orders = storefront.orders.len(),
            "storefront loaded"
        );
        Ok(Self {
            store,
            config: Arc::new(config),
            storefront: Arc::new(Mutex::new(storefront)),
        })
    }

    /// Picks Postgres when `DATABASE_URL` is configured, memory otherwise.
    /// Pending SQL migrations are applied before the state is loaded.
    pub async fn from_config(config: AppConfig) -> anyhow::Result<Self> {
        let store = match &config.database_url {
            Some(url) => {
                let conn = create_orm_conn(url).await?;
                let applied = run_migrations(&conn, MIGRATIONS_DIR).await?;
                tracing::info!(files = applied, "migrations applied");
                StoreBackend::from(PgStore::new(conn))
            }
            None => StoreBackend::from(MemoryStore::new()),
        };
        Ok(Self::new(store, config).await?)
    }

    pub async fn in_memory(config: AppConfig) -> AppResult<Self> {
        Self::new(MemoryStore::new().into(), config).await
    }

    pub async fn read<T>(&self, f: impl FnOnce(&Storefront) -> T) -> T {
        let storefront = self.storefront.lock().await;
        f(&storefront)
    }

    /// Resolves a session id. Sessions whose account was deleted no longer resolve.
    pub async fn session(&self, session_id: Uuid) -> AppResult<Option<Session>> {
        let storefront = self.storefront.lock().await;
        self.resolve_session(&storefront, session_id).await
    }

    async fn resolve_session(
        &self,
        storefront: &Storefront,
        session_id: Uuid,
    ) -> AppResult<Option<Session>> {
        let session = Session::load(&self.store, session_id).await?;
        Ok(session.filter(|s| storefront.user(s.user.user_id).is_some()))
    }

    /// Runs one mutation as a unit.
    ///
    /// `f` works on a copy of the state. Its changes are written to the store
    /// in a single batch and become visible only after that write succeeded;
    /// on any error the live state and the store are left as they were. The
    /// lock is held across the write, so mutations are applied one at a time.
    pub async fn transact<T>(
        &self,
        session_id: Option<Uuid>,
        f: impl FnOnce(&mut Draft) -> AppResult<T>,
    ) -> AppResult<T> {
        let mut storefront = self.storefront.lock().await;
        let session = match session_id {
            Some(id) => self.resolve_session(&storefront, id).await?,
            None => None,
        };

        let mut draft = Draft::new(storefront.clone(), session);
        let output = f(&mut draft)?;

        if draft.is_dirty() {
            let writes = draft.writes()?;
            let count = writes.len();
            if let Err(err) = self.store.apply(writes).await {
                tracing::error!(error = %err, writes = count, "store write failed, changes discarded");
                return Err(err);
            }
            tracing::debug!(writes = count, "changes committed");
            let (next, _) = draft.into_parts();
            *storefront = next;
        }

        Ok(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::AppError,
        models::{Role, User},
        store::{Scope, StoreKey},
    };
    use chrono::Utc;

    async fn memory_state() -> (AppState, MemoryStore) {
        let store = MemoryStore::new();
        let state = AppState::new(store.clone().into(), AppConfig::for_memory("secret"))
            .await
            .unwrap();
        (state, store)
    }

    fn user(email: &str) -> User {
        User {
            id: Uuid::new_v4(),
            email: email.into(),
            password_hash: "x".into(),
            role: Role::Customer,
            name: None,
            phone: None,
            address: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn committed_changes_reach_store_and_state() {
        let (state, store) = memory_state().await;
        state
            .transact(None, |draft| {
                draft.users_mut().push(user("a@example.com"));
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(state.read(|s| s.users.len()).await, 1);
        assert!(store.get(Scope::Durable, StoreKey::Users).await.is_some());
    }

    #[tokio::test]
    async fn failed_operation_leaves_state_untouched() {
        let (state, store) = memory_state().await;
        let result: AppResult<()> = state
            .transact(None, |draft| {
                draft.users_mut().push(user("a@example.com"));
                Err(AppError::validation("nope"))
            })
            .await;
        assert!(result.is_err());
        assert_eq!(state.read(|s| s.users.len()).await, 0);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn failed_store_write_discards_changes() {
        let (state, store) = memory_state().await;
        store.set_read_only(true);
        let result = state
            .transact(None, |draft| {
                draft.users_mut().push(user("a@example.com"));
                Ok(())
            })
            .await;
        assert!(matches!(result, Err(AppError::Storage(_))));
        assert_eq!(state.read(|s| s.users.len()).await, 0);
    }

    #[tokio::test]
    async fn state_reloads_from_store() {
        let (state, store) = memory_state().await;
        state
            .transact(None, |draft| {
                draft.users_mut().push(user("a@example.com"));
                Ok(())
            })
            .await
            .unwrap();

        let reloaded = AppState::new(store.into(), AppConfig::for_memory("secret"))
            .await
            .unwrap();
        assert_eq!(reloaded.read(|s| s.users[0].email.clone()).await, "a@example.com");
    }
}
