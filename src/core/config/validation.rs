#![allow(clippy::result_large_err)]

use super::{BizflowConfig, StorageBackend};
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use std::time::Duration;
use url::Url;

pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate configuration rules
    pub fn validate(config: &BizflowConfig) -> Result<(), AppError> {
        Url::parse(&config.analytics.base_url).map_err(|err| {
            invalid(format!(
                "analytics.base_url '{}' is not a valid URL: {}",
                config.analytics.base_url, err
            ))
        })?;

        if config.analytics.api_version.trim().is_empty() {
            return Err(invalid("analytics.api_version cannot be empty"));
        }

        parse_duration("analytics.timeout", &config.analytics.timeout)?;

        if let Some(timeout) = &config.processing.timeout {
            parse_duration("processing.timeout", timeout)?;
        }

        if config.upload.max_size_mb == 0 {
            return Err(invalid("upload.max_size_mb must be greater than zero"));
        }

        if config.upload.bucket.trim().is_empty() {
            return Err(invalid("upload.bucket cannot be empty"));
        }

        if config.storage.backend == StorageBackend::Rest {
            let rest_url = config.storage.rest_url.as_deref().ok_or_else(|| {
                invalid("storage.rest_url is required when storage.backend is rest")
            })?;
            Url::parse(rest_url)
                .map_err(|err| invalid(format!("storage.rest_url is not a valid URL: {}", err)))?;
        }

        if config.session.user_id.as_deref().map(str::trim) == Some("") {
            return Err(invalid("session.user_id cannot be blank"));
        }

        Ok(())
    }
}

/// Parse a humantime duration, naming the offending key on failure.
pub fn parse_duration(key: &str, value: &str) -> Result<Duration, AppError> {
    humantime::parse_duration(value)
        .map_err(|err| invalid(format!("{} '{}' is not a valid duration: {}", key, value, err)))
}

fn invalid(message: impl Into<String>) -> AppError {
    AppError::new(ErrorCategory::ValidationError, message)
}
