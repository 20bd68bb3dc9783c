use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main bizflow configuration loaded from bizflow.toml
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BizflowConfig {
    /// Remote analytics endpoint used when a feature has no local strategy
    #[serde(default)]
    pub analytics: AnalyticsConfig,

    /// Record store backend
    #[serde(default)]
    pub storage: StorageConfig,

    /// Upload limits and object storage location
    #[serde(default)]
    pub upload: UploadConfig,

    /// Processing stage settings
    #[serde(default)]
    pub processing: ProcessingConfig,

    /// Signed-in identity; absent means unauthenticated
    #[serde(default)]
    pub session: SessionConfig,
}

/// Analytics endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    #[serde(default = "default_analytics_base_url")]
    pub base_url: String,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Name of the environment variable holding the bearer token
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Request timeout in humantime notation
    #[serde(default = "default_analytics_timeout")]
    pub timeout: String,
}

/// Record store backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    File,
    Memory,
    Rest,
}

/// Record store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,

    /// Directory for the file backend, relative to the workspace
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Base URL of the REST record store
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rest_url: Option<String>,

    /// Name of the environment variable holding the REST store key
    #[serde(default = "default_anon_key_env")]
    pub anon_key_env: String,
}

/// Upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    #[serde(default = "default_bucket")]
    pub bucket: String,

    #[serde(default = "default_max_size_mb")]
    pub max_size_mb: u64,

    /// Directory backing local object storage, relative to the workspace
    #[serde(default = "default_objects_dir")]
    pub objects_dir: PathBuf,
}

/// Processing configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProcessingConfig {
    /// Optional per-run timeout in humantime notation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,

    /// Send mapped data to the analytics endpoint instead of the built-in strategy
    #[serde(default)]
    pub use_remote: bool,
}

/// Session configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SessionConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

fn default_analytics_base_url() -> String {
    "https://api.deepseek.com".to_string()
}

fn default_api_version() -> String {
    "v1".to_string()
}

fn default_api_key_env() -> String {
    "BIZFLOW_ANALYTICS_API_KEY".to_string()
}

fn default_analytics_timeout() -> String {
    "60s".to_string()
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".bizflow/records")
}

fn default_anon_key_env() -> String {
    "BIZFLOW_STORE_KEY".to_string()
}

fn default_bucket() -> String {
    "uploads".to_string()
}

fn default_max_size_mb() -> u64 {
    10
}

fn default_objects_dir() -> PathBuf {
    PathBuf::from(".bizflow/objects")
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        AnalyticsConfig {
            base_url: default_analytics_base_url(),
            api_version: default_api_version(),
            api_key_env: default_api_key_env(),
            timeout: default_analytics_timeout(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        StorageConfig {
            backend: StorageBackend::default(),
            data_dir: default_data_dir(),
            rest_url: None,
            anon_key_env: default_anon_key_env(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        UploadConfig {
            bucket: default_bucket(),
            max_size_mb: default_max_size_mb(),
            objects_dir: default_objects_dir(),
        }
    }
}


pub mod loader;
pub mod validation;

pub use loader::ConfigLoader;
pub use validation::ConfigValidator;
