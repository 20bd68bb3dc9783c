#![allow(clippy::result_large_err)]

//! Client for the remote analytics endpoint and the strategy built on it.

use crate::core::config::validation::parse_duration;
use crate::core::config::AnalyticsConfig;
use crate::core::error::AppError;
use crate::core::pipeline::strategy::ProcessingStrategy;
use crate::core::types::ErrorCategory;
use async_trait::async_trait;
use bizflow_types::AnalyticsEnvelope;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

pub const FORECASTING_ENDPOINT: &str = "forecasting/timeseries";
pub const TEXT_ENDPOINT: &str = "text/generate";
pub const DOCUMENT_ENDPOINT: &str = "document/analyze";

/// Leaf failures of an analytics call, before they are folded into an
/// [`AnalyticsEnvelope`].
#[derive(Debug, thiserror::Error)]
pub enum AnalyticsClientError {
    #[error("API key is not configured")]
    MissingApiKey,
    #[error("{0}")]
    Request(String),
    #[error("response is not valid JSON: {0}")]
    Decode(String),
    #[error("{message}")]
    Api { code: String, message: String },
}

impl AnalyticsClientError {
    pub fn code(&self) -> &str {
        match self {
            AnalyticsClientError::MissingApiKey => "auth_error",
            AnalyticsClientError::Request(_) => "request_error",
            AnalyticsClientError::Decode(_) => "decode_error",
            AnalyticsClientError::Api { code, .. } => code,
        }
    }

    pub fn into_envelope(self) -> AnalyticsEnvelope {
        let code = self.code().to_string();
        AnalyticsEnvelope::failure(self.to_string(), code)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalysisType {
    Summary,
    Entities,
    Sentiment,
    Keywords,
}

impl AnalysisType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnalysisType::Summary => "summary",
            AnalysisType::Entities => "entities",
            AnalysisType::Sentiment => "sentiment",
            AnalysisType::Keywords => "keywords",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextOptions {
    pub max_tokens: u32,
    pub temperature: f64,
    pub top_p: f64,
}

impl Default for TextOptions {
    fn default() -> Self {
        Self {
            max_tokens: 1000,
            temperature: 0.7,
            top_p: 0.9,
        }
    }
}

/// `POST {base_url}/{api_version}/{endpoint}` with bearer auth. Every call
/// resolves to an envelope; failures never escape as errors.
#[derive(Clone)]
pub struct AnalyticsClient {
    http: reqwest::Client,
    base_url: String,
    api_version: String,
    api_key: Option<String>,
}

impl AnalyticsClient {
    pub fn new(
        base_url: &str,
        api_version: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| {
                AppError::with_source(
                    ErrorCategory::InternalError,
                    "failed to build analytics HTTP client",
                    Box::new(err),
                )
            })?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_version: api_version.trim_matches('/').to_string(),
            api_key: api_key.filter(|key| !key.trim().is_empty()),
        })
    }

    /// Client described by `[analytics]`; the key is read from `api_key_env`.
    pub fn from_config(config: &AnalyticsConfig) -> Result<Self, AppError> {
        let timeout = parse_duration("analytics.timeout", &config.timeout)?;
        let api_key = std::env::var(&config.api_key_env).ok();
        Self::new(&config.base_url, &config.api_version, api_key, timeout)
    }

    pub fn has_api_key(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn endpoint_url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            self.api_version,
            endpoint.trim_start_matches('/')
        )
    }

    async fn send(&self, endpoint: &str, body: &Value) -> Result<Value, AnalyticsClientError> {
        let api_key = self.api_key.as_deref().ok_or(AnalyticsClientError::MissingApiKey)?;
        let url = self.endpoint_url(endpoint);
        tracing::debug!(%url, "calling analytics endpoint");

        let response = self
            .http
            .post(&url)
            .bearer_auth(api_key)
            .json(body)
            .send()
            .await
            .map_err(|err| AnalyticsClientError::Request(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail: Value = response.json().await.unwrap_or(Value::Null);
            let message = detail
                .get("message")
                .and_then(Value::as_str)
                .filter(|message| !message.is_empty())
                .unwrap_or("API request failed")
                .to_string();
            let code = detail
                .get("code")
                .and_then(Value::as_str)
                .filter(|code| !code.is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("status_{}", status.as_u16()));
            return Err(AnalyticsClientError::Api { code, message });
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| AnalyticsClientError::Request(err.to_string()))?;
        serde_json::from_slice(&body).map_err(|err| AnalyticsClientError::Decode(err.to_string()))
    }

    /// Post `body` to `endpoint` and wrap the outcome in an envelope.
    pub async fn call(&self, endpoint: &str, body: Value) -> AnalyticsEnvelope {
        match self.send(endpoint, &body).await {
            Ok(data) => AnalyticsEnvelope::ok(data),
            Err(err) => {
                tracing::warn!(endpoint, code = err.code(), "analytics call failed: {}", err);
                err.into_envelope()
            }
        }
    }

    pub async fn timeseries_forecasting(
        &self,
        data: &[f64],
        periods: u32,
        frequency: &str,
        seasonality: bool,
    ) -> AnalyticsEnvelope {
        self.call(
            FORECASTING_ENDPOINT,
            json!({
                "data": data,
                "periods": periods,
                "frequency": frequency,
                "seasonality": seasonality,
            }),
        )
        .await
    }

    pub async fn generate_text(&self, prompt: &str, options: &TextOptions) -> AnalyticsEnvelope {
        self.call(
            TEXT_ENDPOINT,
            json!({
                "prompt": prompt,
                "max_tokens": options.max_tokens,
                "temperature": options.temperature,
                "top_p": options.top_p,
            }),
        )
        .await
    }

    pub async fn analyze_document(&self, text: &str, analysis: AnalysisType) -> AnalyticsEnvelope {
        self.call(
            DOCUMENT_ENDPOINT,
            json!({"text": text, "analysis_type": analysis.as_str()}),
        )
        .await
    }
}

/// Processing strategy that posts `{ "input": mapped }` to a feature's
/// endpoint and decodes the envelope's data as the result.
pub struct RemoteStrategy<M, R> {
    client: Arc<AnalyticsClient>,
    endpoint: String,
    _types: PhantomData<fn(&M) -> R>,
}

impl<M, R> RemoteStrategy<M, R> {
    pub fn new(client: Arc<AnalyticsClient>, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            _types: PhantomData,
        }
    }
}

#[async_trait]
impl<M, R> ProcessingStrategy<M, R> for RemoteStrategy<M, R>
where
    M: Serialize + Sync,
    R: DeserializeOwned + Send,
{
    fn name(&self) -> &str {
        "remote"
    }

    async fn process(&self, mapped: &M) -> Result<R, AppError> {
        let envelope = self
            .client
            .call(&self.endpoint, json!({ "input": mapped }))
            .await;

        if !envelope.success {
            let (message, code) = envelope
                .error
                .map(|failure| (failure.message, failure.code))
                .unwrap_or_else(|| ("API request failed".to_string(), "unknown_error".to_string()));
            return Err(AppError::processing(message).with_code(code));
        }

        serde_json::from_value(envelope.data.unwrap_or(Value::Null)).map_err(|err| {
            AppError::processing(format!(
                "analytics response from '{}' has an unexpected shape: {}",
                self.endpoint, err
            ))
            .with_code("decode_error")
        })
    }
}
