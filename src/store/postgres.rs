use chrono::Utc;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, TransactionTrait,
    sea_query::OnConflict,
};
use serde_json::Value;

use super::{Scope, StoreKey, Write};
use crate::{
    entity::store_entries::{ActiveModel, Column, Entity as StoreEntries},
    error::AppResult,
};

/// `store_entries` table, one row per (scope, key).
#[derive(Clone)]
pub struct PgStore {
    conn: DatabaseConnection,
}

impl PgStore {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get(&self, scope: Scope, key: StoreKey) -> AppResult<Option<Value>> {
        let row = StoreEntries::find_by_id((scope.to_string(), key.as_str().to_string()))
            .one(&self.conn)
            .await?;
        Ok(row.map(|entry| entry.value))
    }

    pub async fn apply(&self, writes: Vec<Write>) -> AppResult<()> {
        let txn = self.conn.begin().await?;
        let now = Utc::now();

        for write in writes {
            match write {
                Write::Put { scope, key, value } => {
                    let entry = ActiveModel {
                        scope: Set(scope.to_string()),
                        key: Set(key.as_str().to_string()),
                        value: Set(value),
                        updated_at: Set(now.into()),
                    };
                    StoreEntries::insert(entry)
                        .on_conflict(
                            OnConflict::columns([Column::Scope, Column::Key])
                                .update_columns([Column::Value, Column::UpdatedAt])
                                .to_owned(),
                        )
                        .exec(&txn)
                        .await?;
                }
                Write::Delete { scope, key } => {
                    StoreEntries::delete_many()
                        .filter(Column::Scope.eq(scope.to_string()))
                        .filter(Column::Key.eq(key.as_str()))
                        .exec(&txn)
                        .await?;
                }
            }
        }

        txn.commit().await?;
        Ok(())
    }
}
