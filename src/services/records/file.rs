use super::{apply_patch, not_found, prepare_insert, record_id, validate_table, RecordFilter, RecordStore};
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use crate::utils::{FileSerializer, FileUtils, JsonSerializer};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;

/// One pretty-printed JSON array per table under `dir/{table}.json`.
/// Every write replaces the file atomically.
pub struct FileRecordStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl FileRecordStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn table_path(&self, table: &str) -> PathBuf {
        self.dir.join(format!("{}.json", table))
    }

    fn load(&self, table: &str) -> Result<Vec<Value>, AppError> {
        let path = self.table_path(table);
        FileUtils
            .load_from_file::<Vec<Value>, _>(&path, &JsonSerializer)
            .map(Option::unwrap_or_default)
            .map_err(|err| storage_failure(format!("cannot load table '{}'", table), err))
    }

    fn store(&self, table: &str, rows: &[Value]) -> Result<(), AppError> {
        let path = self.table_path(table);
        FileUtils
            .save_to_file(&path, &rows, &JsonSerializer)
            .map_err(|err| storage_failure(format!("cannot write table '{}'", table), err))
    }
}

fn storage_failure(message: String, err: anyhow::Error) -> AppError {
    AppError::with_source(ErrorCategory::StorageError, message, err.into())
}

#[async_trait]
impl RecordStore for FileRecordStore {
    fn backend(&self) -> &'static str {
        "file"
    }

    async fn insert(&self, table: &str, record: Value) -> Result<Value, AppError> {
        validate_table(table)?;
        let record = prepare_insert(record)?;
        let _guard = self.write_lock.lock().await;
        let mut rows = self.load(table)?;
        rows.push(record.clone());
        self.store(table, &rows)?;
        tracing::debug!(table, id = record_id(&record), "record inserted");
        Ok(record)
    }

    async fn get(&self, table: &str, filter: &RecordFilter) -> Result<Vec<Value>, AppError> {
        validate_table(table)?;
        let _guard = self.write_lock.lock().await;
        Ok(filter.apply(self.load(table)?))
    }

    async fn update(&self, table: &str, id: &str, patch: Value) -> Result<Value, AppError> {
        validate_table(table)?;
        let _guard = self.write_lock.lock().await;
        let mut rows = self.load(table)?;
        let row = rows
            .iter_mut()
            .find(|row| record_id(row) == Some(id))
            .ok_or_else(|| not_found(table, id))?;
        apply_patch(row, patch)?;
        let updated = row.clone();
        self.store(table, &rows)?;
        Ok(updated)
    }

    async fn delete(&self, table: &str, id: &str) -> Result<(), AppError> {
        validate_table(table)?;
        let _guard = self.write_lock.lock().await;
        let mut rows = self.load(table)?;
        let before = rows.len();
        rows.retain(|row| record_id(row) != Some(id));
        if rows.len() == before {
            return Err(not_found(table, id));
        }
        self.store(table, &rows)
    }
}
