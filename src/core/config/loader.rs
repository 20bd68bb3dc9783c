#![allow(clippy::result_large_err)]

use super::{BizflowConfig, StorageBackend};
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use std::env;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "bizflow.toml";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load config from workspace root (workspace/bizflow.toml)
    /// Environment variables override config file values
    pub fn load_from_workspace(workspace_path: &Path) -> Result<BizflowConfig, AppError> {
        let config_path = workspace_path.join(CONFIG_FILE_NAME);
        Self::load(&config_path)
    }

    /// Load config from an explicit file (missing file means defaults) plus env overrides
    pub fn load(path: &Path) -> Result<BizflowConfig, AppError> {
        let mut config = Self::load_from_file(path)?.unwrap_or_default();
        Self::apply_env_overrides(&mut config);
        Ok(config)
    }

    /// Load config from specific file path
    /// Returns Ok(None) if file doesn't exist
    pub fn load_from_file(path: &Path) -> Result<Option<BizflowConfig>, AppError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::new(
                ErrorCategory::IoError,
                format!("Failed to read config file {}: {}", path.display(), e),
            )
        })?;

        let config: BizflowConfig = toml::from_str(&content).map_err(|e| {
            AppError::new(
                ErrorCategory::ValidationError,
                format!("Failed to parse config file {}: {}", path.display(), e),
            )
        })?;

        Ok(Some(config))
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(config: &mut BizflowConfig) {
        // Analytics overrides
        if let Ok(base_url) = env::var("BIZFLOW_ANALYTICS_BASE_URL") {
            config.analytics.base_url = base_url;
        }

        if let Ok(api_version) = env::var("BIZFLOW_ANALYTICS_API_VERSION") {
            config.analytics.api_version = api_version;
        }

        if let Ok(timeout) = env::var("BIZFLOW_ANALYTICS_TIMEOUT") {
            config.analytics.timeout = timeout;
        }

        // Storage overrides
        if let Ok(backend) = env::var("BIZFLOW_STORAGE_BACKEND") {
            match backend.trim().to_lowercase().as_str() {
                "file" => config.storage.backend = StorageBackend::File,
                "memory" => config.storage.backend = StorageBackend::Memory,
                "rest" => config.storage.backend = StorageBackend::Rest,
                other => tracing::warn!("ignoring unknown BIZFLOW_STORAGE_BACKEND '{}'", other),
            }
        }

        if let Ok(data_dir) = env::var("BIZFLOW_STORAGE_DATA_DIR") {
            config.storage.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(rest_url) = env::var("BIZFLOW_STORAGE_REST_URL") {
            config.storage.rest_url = Some(rest_url);
        }

        // Upload overrides
        if let Ok(bucket) = env::var("BIZFLOW_UPLOAD_BUCKET") {
            config.upload.bucket = bucket;
        }

        if let Ok(max_size) = env::var("BIZFLOW_UPLOAD_MAX_SIZE_MB") {
            if let Ok(max_size) = max_size.parse::<u64>() {
                config.upload.max_size_mb = max_size;
            }
        }

        // Processing overrides
        if let Ok(timeout) = env::var("BIZFLOW_PROCESSING_TIMEOUT") {
            config.processing.timeout = Some(timeout);
        }

        if let Ok(use_remote) = env::var("BIZFLOW_PROCESSING_USE_REMOTE") {
            if let Ok(use_remote) = use_remote.parse::<bool>() {
                config.processing.use_remote = use_remote;
            }
        }

        // Session overrides
        if let Ok(user_id) = env::var("BIZFLOW_USER_ID") {
            config.session.user_id = Some(user_id);
        }

        if let Ok(name) = env::var("BIZFLOW_USER_NAME") {
            config.session.name = Some(name);
        }

        if let Ok(email) = env::var("BIZFLOW_USER_EMAIL") {
            config.session.email = Some(email);
        }
    }

    /// Get documentation for supported environment variables
    pub fn env_var_documentation() -> &'static [&'static str] {
        &[
            "BIZFLOW_ANALYTICS_BASE_URL - Override analytics endpoint base URL",
            "BIZFLOW_ANALYTICS_API_VERSION - Override analytics API version (default: v1)",
            "BIZFLOW_ANALYTICS_TIMEOUT - Override analytics request timeout (default: 60s)",
            "BIZFLOW_STORAGE_BACKEND - Record store backend: file, memory or rest",
            "BIZFLOW_STORAGE_DATA_DIR - Directory used by the file record store",
            "BIZFLOW_STORAGE_REST_URL - Base URL of the REST record store",
            "BIZFLOW_UPLOAD_BUCKET - Override upload bucket (default: uploads)",
            "BIZFLOW_UPLOAD_MAX_SIZE_MB - Override maximum upload size (default: 10)",
            "BIZFLOW_PROCESSING_TIMEOUT - Per-run processing timeout",
            "BIZFLOW_PROCESSING_USE_REMOTE - Use the analytics endpoint for processing (true/false)",
            "BIZFLOW_USER_ID / BIZFLOW_USER_NAME / BIZFLOW_USER_EMAIL - Signed-in identity",
        ]
    }
}
