#![allow(clippy::result_large_err)]

use super::{apply_patch, not_found, prepare_insert, validate_table, RecordFilter, RecordStore};
use crate::core::config::StorageConfig;
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use async_trait::async_trait;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use reqwest::{Method, RequestBuilder};
use serde_json::{json, Value};
use url::Url;

/// Characters left as-is in query keys and values.
const QUERY_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'*');

/// Record store speaking the PostgREST dialect (`/rest/v1/{table}`).
#[derive(Clone)]
pub struct RestRecordStore {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl RestRecordStore {
    pub fn new(base_url: &str, api_key: Option<String>) -> Result<Self, AppError> {
        Url::parse(base_url).map_err(|err| {
            AppError::new(
                ErrorCategory::ValidationError,
                format!("invalid record store URL '{}': {}", base_url, err),
            )
        })?;
        Ok(Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Store described by `[storage]`; the key is read from `anon_key_env`.
    pub fn from_config(config: &StorageConfig) -> Result<Self, AppError> {
        let base_url = config.rest_url.as_deref().ok_or_else(|| {
            AppError::new(
                ErrorCategory::ValidationError,
                "storage.rest_url is required for the rest backend",
            )
        })?;
        let api_key = std::env::var(&config.anon_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty());
        if api_key.is_none() {
            tracing::warn!(env = %config.anon_key_env, "record store key is not set; requests are anonymous");
        }
        Self::new(base_url, api_key)
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.base_url, table)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let builder = self.http.request(method, url);
        match &self.api_key {
            Some(key) => builder.header("apikey", key).bearer_auth(key),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Value, AppError> {
        let response = builder.send().await.map_err(|err| {
            AppError::with_source(
                ErrorCategory::NetworkError,
                "record store request failed",
                Box::new(err),
            )
        })?;
        let status = response.status();
        let body = response.text().await;
        if !status.is_success() {
            let message = body
                .ok()
                .and_then(|body| serde_json::from_str::<Value>(&body).ok())
                .and_then(|value| value.get("message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| format!("record store returned {}", status));
            return Err(AppError::storage(message).with_code(format!("status_{}", status.as_u16())));
        }
        let body = body.map_err(|err| {
            AppError::with_source(
                ErrorCategory::NetworkError,
                "failed to read record store response",
                Box::new(err),
            )
        })?;
        if body.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&body)?)
    }
}

/// PostgREST query string for `filter`.
pub fn build_query(filter: &RecordFilter) -> String {
    let mut parts = vec!["select=*".to_string()];
    for (column, value) in &filter.conditions {
        let condition = match value {
            Value::Null => "is.null".to_string(),
            other => format!("eq.{}", literal(other)),
        };
        parts.push(format!("{}={}", encode(column), encode(&condition)));
    }
    if let Some((column, order)) = &filter.order_by {
        parts.push(format!("order={}.{}", encode(column), order.as_str()));
    }
    if let Some(limit) = filter.limit {
        parts.push(format!("limit={}", limit));
    }
    parts.join("&")
}

fn id_query(id: &str) -> String {
    format!("id=eq.{}", encode(id))
}

fn literal(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

fn encode(value: &str) -> String {
    utf8_percent_encode(value, QUERY_ENCODE_SET).to_string()
}

fn rows_of(value: Value) -> Vec<Value> {
    match value {
        Value::Array(rows) => rows,
        Value::Null => Vec::new(),
        other => vec![other],
    }
}

#[async_trait]
impl RecordStore for RestRecordStore {
    fn backend(&self) -> &'static str {
        "rest"
    }

    async fn insert(&self, table: &str, record: Value) -> Result<Value, AppError> {
        validate_table(table)?;
        let record = prepare_insert(record)?;
        let builder = self
            .request(Method::POST, &self.table_url(table))
            .header("Prefer", "return=representation")
            .json(&record);
        let stored = rows_of(self.send(builder).await?);
        stored
            .into_iter()
            .next()
            .ok_or_else(|| AppError::storage(format!("insert into '{}' returned no row", table)))
    }

    async fn get(&self, table: &str, filter: &RecordFilter) -> Result<Vec<Value>, AppError> {
        validate_table(table)?;
        let url = format!("{}?{}", self.table_url(table), build_query(filter));
        Ok(rows_of(self.send(self.request(Method::GET, &url)).await?))
    }

    async fn update(&self, table: &str, id: &str, patch: Value) -> Result<Value, AppError> {
        validate_table(table)?;
        let mut body = json!({});
        apply_patch(&mut body, patch)?;
        let url = format!("{}?{}", self.table_url(table), id_query(id));
        let builder = self
            .request(Method::PATCH, &url)
            .header("Prefer", "return=representation")
            .json(&body);
        rows_of(self.send(builder).await?)
            .into_iter()
            .next()
            .ok_or_else(|| not_found(table, id))
    }

    async fn delete(&self, table: &str, id: &str) -> Result<(), AppError> {
        validate_table(table)?;
        let url = format!("{}?{}", self.table_url(table), id_query(id));
        let builder = self
            .request(Method::DELETE, &url)
            .header("Prefer", "return=representation");
        if rows_of(self.send(builder).await?).is_empty() {
            return Err(not_found(table, id));
        }
        Ok(())
    }
}
