#![allow(clippy::result_large_err)]

use crate::core::error::AppError;
use crate::core::pipeline::strategy::ProcessingStrategy;
use crate::services::parser::ParsedDocument;
use bizflow_types::SummaryLine;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// Bound shared by every payload that flows through a pipeline.
pub trait Payload: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

impl<T> Payload for T where T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static {}

/// Static metadata of a feature page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeatureDescriptor {
    pub key: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    /// Record store table results are saved into.
    pub table_name: &'static str,
    /// Analytics endpoint used when no built-in strategy is configured.
    pub api_endpoint: &'static str,
    /// Lowercase extensions including the leading dot.
    pub allowed_file_types: &'static [&'static str],
}

impl FeatureDescriptor {
    pub fn accepts_extension(&self, extension: &str) -> bool {
        let extension = extension.to_lowercase();
        self.allowed_file_types.iter().any(|allowed| *allowed == extension)
    }
}

/// A feature bundles its payload types with the per-feature stage logic.
///
/// The pipeline controller is generic over this trait and never looks inside
/// the payloads.
pub trait Feature: Send + Sync + 'static {
    type Input: Payload;
    type Mapped: Payload;
    type Output: Payload;

    fn descriptor(&self) -> FeatureDescriptor;

    /// Convert a parsed upload into the feature's input shape.
    fn input_from_document(&self, document: ParsedDocument) -> Result<Self::Input, AppError> {
        let descriptor = self.descriptor();
        serde_json::from_value(document.into_value()).map_err(|err| {
            AppError::input(format!(
                "document does not match the {} input layout: {}",
                descriptor.title, err
            ))
        })
    }

    /// Apply user-chosen parameters to the input. Missing or malformed
    /// parameters fail with a `MappingError`.
    fn map(&self, input: &Self::Input, params: &MappingParams) -> Result<Self::Mapped, AppError>;

    /// Labelled lines shown by the visualization stage.
    fn summarize(&self, output: &Self::Output) -> Vec<SummaryLine>;

    /// Deterministic local strategy; `None` defers to the analytics endpoint.
    fn builtin_strategy(&self) -> Option<Arc<dyn ProcessingStrategy<Self::Mapped, Self::Output>>> {
        None
    }
}

/// Free-form parameters chosen at the mapping stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MappingParams(Map<String, Value>);

impl MappingParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_value(value: Value) -> Result<Self, AppError> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            Value::Null => Ok(Self::default()),
            other => Err(AppError::mapping(format!(
                "mapping parameters must be an object, got {}",
                other
            ))),
        }
    }

    /// Parse `key=value` pairs. Values that read as JSON (numbers, booleans,
    /// arrays) keep that type; anything else is a string.
    pub fn parse_pairs<I, S>(pairs: I) -> Result<Self, AppError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut map = Map::new();
        for pair in pairs {
            let pair = pair.as_ref();
            let (key, raw) = pair.split_once('=').ok_or_else(|| {
                AppError::mapping(format!("parameter '{}' is not in key=value form", pair))
            })?;
            let key = key.trim();
            if key.is_empty() {
                return Err(AppError::mapping(format!("parameter '{}' has an empty key", pair)));
            }
            let raw = raw.trim();
            let value = serde_json::from_str::<Value>(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
            map.insert(key.to_string(), value);
        }
        Ok(Self(map))
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn str_or(&self, key: &str, default: &str) -> Result<String, AppError> {
        match self.0.get(key) {
            None | Some(Value::Null) => Ok(default.to_string()),
            Some(Value::String(value)) => Ok(value.trim().to_lowercase()),
            Some(other) => Err(AppError::mapping(format!(
                "parameter '{}' must be text, got {}",
                key, other
            ))),
        }
    }

    pub fn f64_or(&self, key: &str, default: f64) -> Result<f64, AppError> {
        let value = match self.0.get(key) {
            None | Some(Value::Null) => return Ok(default),
            Some(Value::Number(number)) => number.as_f64(),
            Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
            Some(_) => None,
        };
        match value {
            Some(value) if value.is_finite() => Ok(value),
            _ => Err(AppError::mapping(format!("parameter '{}' must be a number", key))),
        }
    }

    pub fn u64_or(&self, key: &str, default: u64) -> Result<u64, AppError> {
        let value = match self.0.get(key) {
            None | Some(Value::Null) => return Ok(default),
            Some(Value::Number(number)) => number.as_u64(),
            Some(Value::String(text)) => text.trim().parse::<u64>().ok(),
            Some(_) => None,
        };
        value.ok_or_else(|| {
            AppError::mapping(format!("parameter '{}' must be a non-negative integer", key))
        })
    }

    pub fn as_value(&self) -> Value {
        Value::Object(self.0.clone())
    }
}
