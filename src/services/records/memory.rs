use super::{apply_patch, not_found, prepare_insert, record_id, validate_table, RecordFilter, RecordStore};
use crate::core::error::AppError;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Process-local store; rows live as long as the store.
#[derive(Default)]
pub struct InMemoryRecordStore {
    tables: RwLock<HashMap<String, Vec<Value>>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count(&self, table: &str) -> usize {
        self.tables.read().await.get(table).map_or(0, Vec::len)
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn insert(&self, table: &str, record: Value) -> Result<Value, AppError> {
        validate_table(table)?;
        let record = prepare_insert(record)?;
        self.tables
            .write()
            .await
            .entry(table.to_string())
            .or_default()
            .push(record.clone());
        Ok(record)
    }

    async fn get(&self, table: &str, filter: &RecordFilter) -> Result<Vec<Value>, AppError> {
        validate_table(table)?;
        let tables = self.tables.read().await;
        let rows = tables.get(table).cloned().unwrap_or_default();
        Ok(filter.apply(rows))
    }

    async fn update(&self, table: &str, id: &str, patch: Value) -> Result<Value, AppError> {
        validate_table(table)?;
        let mut tables = self.tables.write().await;
        let row = tables
            .get_mut(table)
            .and_then(|rows| rows.iter_mut().find(|row| record_id(row) == Some(id)))
            .ok_or_else(|| not_found(table, id))?;
        apply_patch(row, patch)?;
        Ok(row.clone())
    }

    async fn delete(&self, table: &str, id: &str) -> Result<(), AppError> {
        validate_table(table)?;
        let mut tables = self.tables.write().await;
        let rows = tables.get_mut(table).ok_or_else(|| not_found(table, id))?;
        let before = rows.len();
        rows.retain(|row| record_id(row) != Some(id));
        if rows.len() == before {
            return Err(not_found(table, id));
        }
        Ok(())
    }
}
