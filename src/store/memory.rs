use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use serde_json::Value;
use tokio::sync::RwLock;

use super::{Scope, StoreKey, Write};
use crate::error::{AppError, AppResult};

/// Process-local store. Clones share the same map.
#[derive(Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<(Scope, StoreKey), Value>>>,
    read_only: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While read-only every write batch is refused and nothing is changed.
    pub fn set_read_only(&self, read_only: bool) {
        self.read_only.store(read_only, Ordering::SeqCst);
    }

    pub async fn get(&self, scope: Scope, key: StoreKey) -> Option<Value> {
        self.entries.read().await.get(&(scope, key)).cloned()
    }

    pub async fn apply(&self, writes: Vec<Write>) -> AppResult<()> {
        let mut entries = self.entries.write().await;
        if self.read_only.load(Ordering::SeqCst) {
            return Err(AppError::Storage("store is read-only".into()));
        }
        for write in writes {
            match write {
                Write::Put { scope, key, value } => {
                    entries.insert((scope, key), value);
                }
                Write::Delete { scope, key } => {
                    entries.remove(&(scope, key));
                }
            }
        }
        Ok(())
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use uuid::Uuid;

    use super::*;

    #[tokio::test]
    async fn batch_puts_and_deletes() {
        let store = MemoryStore::new();
        let session = Scope::Session(Uuid::new_v4());
        store
            .apply(vec![
                Write::Put {
                    scope: Scope::Durable,
                    key: StoreKey::Products,
                    value: json!([]),
                },
                Write::Put {
                    scope: session,
                    key: StoreKey::Cart,
                    value: json!([{"quantity": 1}]),
                },
            ])
            .await
            .unwrap();
        assert_eq!(store.len().await, 2);

        store
            .apply(vec![Write::Delete {
                scope: session,
                key: StoreKey::Cart,
            }])
            .await
            .unwrap();
        assert!(store.get(session, StoreKey::Cart).await.is_none());
        assert_eq!(
            store.get(Scope::Durable, StoreKey::Products).await,
            Some(json!([]))
        );
    }

    #[tokio::test]
    async fn read_only_store_rejects_whole_batch() {
        let store = MemoryStore::new();
        store.set_read_only(true);
        let result = store
            .apply(vec![Write::Put {
                scope: Scope::Durable,
                key: StoreKey::Orders,
                value: json!([]),
            }])
            .await;
        assert!(matches!(result, Err(AppError::Storage(_))));
        assert!(store.is_empty().await);
    }
}
