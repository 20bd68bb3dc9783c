use crate::core::types::{ErrorCategory, ErrorSeverity};
use bizflow_types::ErrorInfo;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug)]
pub struct AppError {
    pub category: ErrorCategory,
    pub severity: ErrorSeverity,
    pub code: String,
    pub message: String,
    pub context: HashMap<String, String>,
    pub recovery_suggestions: Vec<String>,
    pub occurred_at: DateTime<Utc>,
    pub source: Option<anyhow::Error>,
}

impl AppError {
    pub fn new<T: Into<String>>(category: ErrorCategory, message: T) -> Self {
        let severity = match category {
            ErrorCategory::CancelledError => ErrorSeverity::Info,
            ErrorCategory::InputError | ErrorCategory::MappingError => ErrorSeverity::Warning,
            ErrorCategory::ProcessingError
            | ErrorCategory::StorageError
            | ErrorCategory::AuthError
            | ErrorCategory::ValidationError
            | ErrorCategory::TimeoutError
            | ErrorCategory::NetworkError
            | ErrorCategory::SerializationError
            | ErrorCategory::IoError
            | ErrorCategory::InternalError => ErrorSeverity::Error,
        };
        AppError {
            category,
            severity,
            code: default_code(category).to_string(),
            message: message.into(),
            context: HashMap::new(),
            recovery_suggestions: vec![],
            occurred_at: Utc::now(),
            source: None,
        }
    }

    pub fn with_source<T: Into<String>>(
        category: ErrorCategory,
        message: T,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        let mut error = AppError::new(category, message);
        error.source = Some(anyhow::anyhow!(source));
        error
    }

    pub fn with_context<T: Into<String>>(mut self, context: T) -> Self {
        self.context.insert("context".to_string(), context.into());
        self
    }

    pub fn with_code<T: Into<String>>(mut self, code: T) -> Self {
        self.code = code.into();
        self
    }

    pub fn with_suggestion<T: Into<String>>(mut self, suggestion: T) -> Self {
        self.recovery_suggestions.push(suggestion.into());
        self
    }

    pub fn severity(&self) -> ErrorSeverity {
        self.severity
    }

    pub fn add_context(&mut self, key: &str, value: &str) {
        self.context.insert(key.to_string(), value.to_string());
    }

    pub fn is_cancelled(&self) -> bool {
        self.category == ErrorCategory::CancelledError
    }

    /// Banner view of this error stored in pipeline state.
    pub fn to_info(&self) -> ErrorInfo {
        ErrorInfo {
            code: self.code.clone(),
            category: self.category.to_string(),
            message: self.message.clone(),
            occurred_at: self.occurred_at,
        }
    }

    pub fn input<T: Into<String>>(message: T) -> Self {
        AppError::new(ErrorCategory::InputError, message)
    }

    pub fn mapping<T: Into<String>>(message: T) -> Self {
        AppError::new(ErrorCategory::MappingError, message)
    }

    pub fn processing<T: Into<String>>(message: T) -> Self {
        AppError::new(ErrorCategory::ProcessingError, message)
    }

    pub fn storage<T: Into<String>>(message: T) -> Self {
        AppError::new(ErrorCategory::StorageError, message)
    }
}

fn default_code(category: ErrorCategory) -> &'static str {
    match category {
        ErrorCategory::InputError => "BF-INPUT",
        ErrorCategory::MappingError => "BF-MAP",
        ErrorCategory::ProcessingError => "BF-PROC",
        ErrorCategory::StorageError => "BF-STORE",
        ErrorCategory::AuthError => "BF-AUTH",
        ErrorCategory::ValidationError => "BF-VALID",
        ErrorCategory::TimeoutError => "BF-TIME",
        ErrorCategory::CancelledError => "BF-CANCEL",
        ErrorCategory::NetworkError => "BF-NET",
        ErrorCategory::SerializationError => "BF-SERDE",
        ErrorCategory::IoError => "BF-IO",
        ErrorCategory::InternalError => "BF-INTERNAL",
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}: {}", self.code, self.category, self.message)?;
        if !self.context.is_empty() {
            write!(f, " (Context: {:?})", self.context)?;
        }
        if let Some(ref source) = self.source {
            write!(f, "\nCaused by: {}", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        AppError {
            category: ErrorCategory::InternalError,
            severity: ErrorSeverity::Error,
            code: "ANYHOW_ERROR".to_string(),
            message: e.to_string(),
            context: HashMap::new(),
            recovery_suggestions: vec!["Check the error details".to_string()],
            occurred_at: Utc::now(),
            source: Some(e),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError {
            category: ErrorCategory::IoError,
            severity: ErrorSeverity::Error,
            code: "IO_ERROR".to_string(),
            message: e.to_string(),
            context: HashMap::new(),
            recovery_suggestions: vec!["Check file permissions and paths".to_string()],
            occurred_at: Utc::now(),
            source: Some(anyhow::anyhow!(e)),
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(e: serde_json::Error) -> Self {
        AppError::with_source(ErrorCategory::SerializationError, e.to_string(), Box::new(e))
    }
}

/// Sink for user-facing notifications (the "alert" of a save, a dismissed banner, ...).
pub trait ErrorReporter: Send + Sync {
    fn report_error(&self, error: &AppError);
    fn report_warning(&self, message: &str, context: Option<String>);
    fn report_info(&self, message: &str);
}

/// Reporter that forwards every notification to `tracing`.
pub struct TracingErrorReporter;

impl TracingErrorReporter {
    pub fn new() -> Self {
        TracingErrorReporter
    }
}

impl Default for TracingErrorReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorReporter for TracingErrorReporter {
    fn report_error(&self, error: &AppError) {
        tracing::error!(
            code = %error.code,
            category = %error.category,
            "{}",
            error.message
        );
        if let Some(ref source) = error.source {
            tracing::debug!("caused by: {}", source);
        }
    }

    fn report_warning(&self, message: &str, context: Option<String>) {
        match context {
            Some(ctx) => tracing::warn!(context = %ctx, "{}", message),
            None => tracing::warn!("{}", message),
        }
    }

    fn report_info(&self, message: &str) {
        tracing::info!("{}", message);
    }
}

/// One notification captured by [`RecordingReporter`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Error { code: String, message: String },
    Warning(String),
    Info(String),
}

/// Reporter that keeps notifications in memory; used by tests and embedders
/// that render their own alerts.
#[derive(Default)]
pub struct RecordingReporter {
    entries: Mutex<Vec<Notification>>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    fn push(&self, notification: Notification) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(notification);
        }
    }
}

impl ErrorReporter for RecordingReporter {
    fn report_error(&self, error: &AppError) {
        self.push(Notification::Error {
            code: error.code.clone(),
            message: error.message.clone(),
        });
    }

    fn report_warning(&self, message: &str, _context: Option<String>) {
        self.push(Notification::Warning(message.to_string()));
    }

    fn report_info(&self, message: &str) {
        self.push(Notification::Info(message.to_string()));
    }
}
