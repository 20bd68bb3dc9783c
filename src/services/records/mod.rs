#![allow(clippy::result_large_err)]

//! Generic record persistence used by the storage stage and the `records`
//! command.

pub mod file;
pub mod memory;
pub mod rest;

pub use file::FileRecordStore;
pub use memory::InMemoryRecordStore;
pub use rest::RestRecordStore;

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use uuid::Uuid;

#[async_trait]
pub trait RecordStore: Send + Sync {
    fn backend(&self) -> &'static str;

    /// Insert `record`, assigning `id`, `created_at` and `updated_at` when
    /// absent, and return the stored row.
    async fn insert(&self, table: &str, record: Value) -> Result<Value, AppError>;

    async fn get(&self, table: &str, filter: &RecordFilter) -> Result<Vec<Value>, AppError>;

    /// Merge `patch` into the row with `id` and refresh `updated_at`.
    async fn update(&self, table: &str, id: &str, patch: Value) -> Result<Value, AppError>;

    async fn delete(&self, table: &str, id: &str) -> Result<(), AppError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Asc => "asc",
            SortOrder::Desc => "desc",
        }
    }
}

/// Equality conditions, one ordering column and a row limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordFilter {
    pub conditions: Vec<(String, Value)>,
    pub order_by: Option<(String, SortOrder)>,
    pub limit: Option<usize>,
}

impl RecordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.conditions.push((column.into(), value.into()));
        self
    }

    pub fn order(mut self, column: impl Into<String>, order: SortOrder) -> Self {
        self.order_by = Some((column.into(), order));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn matches(&self, record: &Value) -> bool {
        self.conditions
            .iter()
            .all(|(column, expected)| record.get(column).unwrap_or(&Value::Null) == expected)
    }

    /// Filter, sort and truncate rows in memory.
    pub fn apply(&self, rows: impl IntoIterator<Item = Value>) -> Vec<Value> {
        let mut rows: Vec<Value> = rows.into_iter().filter(|row| self.matches(row)).collect();
        if let Some((column, order)) = &self.order_by {
            rows.sort_by(|a, b| {
                let ordering = compare_values(
                    a.get(column).unwrap_or(&Value::Null),
                    b.get(column).unwrap_or(&Value::Null),
                );
                match order {
                    SortOrder::Asc => ordering,
                    SortOrder::Desc => ordering.reverse(),
                }
            });
        }
        if let Some(limit) = self.limit {
            rows.truncate(limit);
        }
        rows
    }
}

/// Null sorts first, then booleans, numbers, strings; other kinds compare equal.
fn compare_values(a: &Value, b: &Value) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) | Value::Object(_) => 4,
        }
    }
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// Current time in the fixed-width RFC 3339 form used for timestamps.
pub fn timestamp_now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Table names are lowercase identifiers.
pub fn validate_table(table: &str) -> Result<(), AppError> {
    let valid = !table.is_empty()
        && table
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        && !table.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(AppError::new(
            ErrorCategory::ValidationError,
            format!("invalid table name '{}'", table),
        ))
    }
}

pub fn record_id(record: &Value) -> Option<&str> {
    record.get("id").and_then(Value::as_str)
}

/// Stamp a new row with `id`, `created_at` and `updated_at` where absent.
pub fn prepare_insert(record: Value) -> Result<Value, AppError> {
    let mut record = match record {
        Value::Object(map) => map,
        other => {
            return Err(AppError::storage(format!(
                "records must be JSON objects, got {}",
                kind_of(&other)
            )))
        }
    };
    let now = timestamp_now();
    record
        .entry("id")
        .or_insert_with(|| Value::String(Uuid::new_v4().to_string()));
    record
        .entry("created_at")
        .or_insert_with(|| Value::String(now.clone()));
    record.entry("updated_at").or_insert(Value::String(now));
    Ok(Value::Object(record))
}

/// Merge the top-level keys of `patch` into `row`. `id` and `created_at` are
/// kept; `updated_at` is refreshed.
pub fn apply_patch(row: &mut Value, patch: Value) -> Result<(), AppError> {
    let patch = match patch {
        Value::Object(map) => map,
        other => {
            return Err(AppError::storage(format!(
                "patch must be a JSON object, got {}",
                kind_of(&other)
            )))
        }
    };
    let row = row
        .as_object_mut()
        .ok_or_else(|| AppError::storage("stored row is not a JSON object"))?;
    for (key, value) in patch {
        if key != "id" && key != "created_at" {
            row.insert(key, value);
        }
    }
    row.insert("updated_at".to_string(), Value::String(timestamp_now()));
    Ok(())
}

pub(crate) fn not_found(table: &str, id: &str) -> AppError {
    AppError::storage(format!("no record '{}' in table '{}'", id, table)).with_code("BF-STORE-404")
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
