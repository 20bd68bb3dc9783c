use bizflow::core::config::{BizflowConfig, ConfigLoader, ConfigValidator, StorageBackend};
use bizflow::core::types::ErrorCategory;
use bizflow::services::{record_store_from_config, SessionContext};
use serial_test::serial;
use std::env;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn clear_bizflow_env() {
    for var in [
        "BIZFLOW_ANALYTICS_BASE_URL",
        "BIZFLOW_ANALYTICS_API_VERSION",
        "BIZFLOW_ANALYTICS_TIMEOUT",
        "BIZFLOW_STORAGE_BACKEND",
        "BIZFLOW_STORAGE_DATA_DIR",
        "BIZFLOW_STORAGE_REST_URL",
        "BIZFLOW_UPLOAD_BUCKET",
        "BIZFLOW_UPLOAD_MAX_SIZE_MB",
        "BIZFLOW_PROCESSING_TIMEOUT",
        "BIZFLOW_PROCESSING_USE_REMOTE",
        "BIZFLOW_USER_ID",
        "BIZFLOW_USER_NAME",
        "BIZFLOW_USER_EMAIL",
    ] {
        env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_missing_file_yields_defaults() {
    clear_bizflow_env();
    let temp_dir = TempDir::new().unwrap();

    let config = ConfigLoader::load_from_workspace(temp_dir.path()).unwrap();
    assert_eq!(config.storage.backend, StorageBackend::File);
    assert_eq!(config.upload.max_size_mb, 10);
    ConfigValidator::validate(&config).unwrap();
    assert!(ConfigLoader::load_from_file(&temp_dir.path().join("bizflow.toml"))
        .unwrap()
        .is_none());
}

#[test]
#[serial]
fn test_workspace_file_and_env_overrides() {
    clear_bizflow_env();
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join("bizflow.toml"),
        r#"
[storage]
backend = "memory"

[upload]
bucket = "documents"
max_size_mb = 2

[processing]
timeout = "45s"

[session]
user_id = "user-7"
name = "Sam"
"#,
    )
    .unwrap();

    env::set_var("BIZFLOW_UPLOAD_MAX_SIZE_MB", "25");
    env::set_var("BIZFLOW_STORAGE_DATA_DIR", "records-here");
    env::set_var("BIZFLOW_PROCESSING_USE_REMOTE", "true");
    let config = ConfigLoader::load_from_workspace(temp_dir.path()).unwrap();
    clear_bizflow_env();

    assert_eq!(config.storage.backend, StorageBackend::Memory);
    assert_eq!(config.storage.data_dir, PathBuf::from("records-here"));
    assert_eq!(config.upload.bucket, "documents");
    assert_eq!(config.upload.max_size_mb, 25);
    assert_eq!(config.processing.timeout.as_deref(), Some("45s"));
    assert!(config.processing.use_remote);
    ConfigValidator::validate(&config).unwrap();

    let session = SessionContext::from_config(&config.session);
    assert!(session.is_authenticated());
    assert_eq!(session.user_id(), Some("user-7"));
}

#[test]
#[serial]
fn test_unparsable_env_values_are_ignored() {
    clear_bizflow_env();
    let temp_dir = TempDir::new().unwrap();
    env::set_var("BIZFLOW_UPLOAD_MAX_SIZE_MB", "lots");
    env::set_var("BIZFLOW_STORAGE_BACKEND", "postgres");
    let config = ConfigLoader::load_from_workspace(temp_dir.path()).unwrap();
    clear_bizflow_env();

    assert_eq!(config.upload.max_size_mb, 10);
    assert_eq!(config.storage.backend, StorageBackend::File);
}

#[test]
#[serial]
fn test_malformed_file_is_a_validation_error() {
    clear_bizflow_env();
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("custom.toml");
    fs::write(&path, "[upload\nbucket = ").unwrap();

    let err = ConfigLoader::load(&path).unwrap_err();
    assert_eq!(err.category, ErrorCategory::ValidationError);
    assert!(err.message.contains("custom.toml"));
}

#[test]
#[serial]
fn test_validator_rejects_bad_values() {
    clear_bizflow_env();
    let mut config = BizflowConfig::default();
    config.processing.timeout = Some("soon".into());
    assert!(ConfigValidator::validate(&config).is_err());

    let mut config = BizflowConfig::default();
    config.upload.max_size_mb = 0;
    assert!(ConfigValidator::validate(&config).is_err());

    let mut config = BizflowConfig::default();
    config.storage.backend = StorageBackend::Rest;
    assert!(ConfigValidator::validate(&config).is_err());
    config.storage.rest_url = Some("https://project.example.co".into());
    ConfigValidator::validate(&config).unwrap();
}

#[test]
#[serial]
fn test_record_store_follows_backend() {
    clear_bizflow_env();
    let temp_dir = TempDir::new().unwrap();
    let mut config = BizflowConfig::default();
    assert_eq!(
        record_store_from_config(&config, temp_dir.path()).unwrap().backend(),
        "file"
    );
    config.storage.backend = StorageBackend::Memory;
    assert_eq!(
        record_store_from_config(&config, temp_dir.path()).unwrap().backend(),
        "memory"
    );
    config.storage.backend = StorageBackend::Rest;
    config.storage.rest_url = Some("http://127.0.0.1:9".into());
    assert_eq!(
        record_store_from_config(&config, temp_dir.path()).unwrap().backend(),
        "rest"
    );
}
