//! Shared serializable types for bizflow pipelines and their collaborators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// The five stages every feature pipeline walks through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    #[default]
    Input,
    Mapping,
    Processing,
    Visualization,
    Storage,
}

impl Stage {
    pub const ALL: [Stage; 5] = [
        Stage::Input,
        Stage::Mapping,
        Stage::Processing,
        Stage::Visualization,
        Stage::Storage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Input => "input",
            Stage::Mapping => "mapping",
            Stage::Processing => "processing",
            Stage::Visualization => "visualization",
            Stage::Storage => "storage",
        }
    }

    /// Next stage in the linear sequence; `None` at the terminal stage.
    pub fn next(&self) -> Option<Stage> {
        match self {
            Stage::Input => Some(Stage::Mapping),
            Stage::Mapping => Some(Stage::Processing),
            Stage::Processing => Some(Stage::Visualization),
            Stage::Visualization => Some(Stage::Storage),
            Stage::Storage => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::Storage)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "input" => Ok(Stage::Input),
            "mapping" => Ok(Stage::Mapping),
            "processing" => Ok(Stage::Processing),
            "visualization" => Ok(Stage::Visualization),
            "storage" => Ok(Stage::Storage),
            other => Err(format!("unknown stage '{}'", other)),
        }
    }
}

/// Authentication status reported by the identity provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum AuthStatus {
    Loading,
    Authenticated,
    #[default]
    Unauthenticated,
}

/// Identity of the signed-in user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: String,
    pub name: String,
    pub email: String,
}

/// Serializable view of a processing failure, shown as a dismissable banner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: String,
    pub category: String,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.code, self.message)
    }
}

/// Failure body returned by the analytics endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyticsFailure {
    pub message: String,
    pub code: String,
}

/// Response envelope of the analytics endpoint: `{success, data}` or
/// `{success: false, error: {message, code}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyticsEnvelope {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<AnalyticsFailure>,
}

impl AnalyticsEnvelope {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(AnalyticsFailure {
                message: message.into(),
                code: code.into(),
            }),
        }
    }
}

/// One labelled value produced by a feature's visualization summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryLine {
    pub label: String,
    pub value: String,
}

impl SummaryLine {
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }
}
