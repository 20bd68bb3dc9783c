use bizflow::cli::Args;
use bizflow::logging::{self, config::{LogRotation, LoggingConfig}, detect_context, ConsoleOutput, ExecutionContext};
use clap::Parser;
use serial_test::serial;
use std::env;
use std::fs;
use tempfile::TempDir;

fn clear_logging_env() {
    for var in [
        "RUST_LOG",
        "BIZFLOW_LOG_LEVEL",
        "BIZFLOW_LOG_FILE",
        "BIZFLOW_LOG_ROTATION",
        "BIZFLOW_REMOTE_AGENT",
        "OTEL_EXPORTER_OTLP_ENDPOINT",
    ] {
        env::remove_var(var);
    }
}

fn parse(args: &[&str]) -> Args {
    Args::try_parse_from(args).expect("arguments should parse")
}

#[test]
#[serial]
fn test_quiet_flag_selects_quiet_context() {
    clear_logging_env();
    let args = parse(&["bizflow", "--quiet", "features"]);
    assert_eq!(detect_context(&args), ExecutionContext::Quiet);
    assert!(ExecutionContext::Quiet.disables_console());
}

#[test]
#[serial]
fn test_remote_agent_override() {
    clear_logging_env();
    env::set_var("BIZFLOW_REMOTE_AGENT", "1");
    let args = parse(&["bizflow", "features"]);
    assert_eq!(detect_context(&args), ExecutionContext::RemoteAgent);
    env::remove_var("BIZFLOW_REMOTE_AGENT");
    assert_eq!(detect_context(&args), ExecutionContext::LocalDev);
}

#[test]
#[serial]
fn test_env_overrides_apply_after_file() {
    clear_logging_env();
    let workspace = TempDir::new().unwrap();
    let config_dir = workspace.path().join(".bizflow").join("config");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(
        config_dir.join("logging.toml"),
        "[logging]\ndefault_level = \"warn\"\nenable_file = true\n",
    )
    .unwrap();

    env::set_var("BIZFLOW_LOG_LEVEL", "trace");
    env::set_var("BIZFLOW_LOG_FILE", "false");
    env::set_var("BIZFLOW_LOG_ROTATION", "daily");
    env::set_var("OTEL_EXPORTER_OTLP_ENDPOINT", "http://localhost:4317");
    let config = LoggingConfig::load(Some(workspace.path())).unwrap();
    clear_logging_env();

    assert_eq!(config.default_level, "trace");
    assert!(!config.enable_file);
    assert_eq!(config.rotation, LogRotation::Daily);
    assert!(config.opentelemetry.enabled);
    assert_eq!(
        config.opentelemetry.endpoint.as_deref(),
        Some("http://localhost:4317")
    );
}

#[test]
#[serial]
fn test_invalid_endpoint_fails_load() {
    clear_logging_env();
    env::set_var("OTEL_EXPORTER_OTLP_ENDPOINT", "not a url");
    let result = LoggingConfig::load(None);
    clear_logging_env();
    assert!(result.is_err());
}

#[test]
#[serial]
fn test_init_writes_file_and_is_one_shot() {
    clear_logging_env();
    let workspace = TempDir::new().unwrap();
    let workspace_arg = workspace.path().to_string_lossy().into_owned();
    let args = parse(&[
        "bizflow",
        "--quiet",
        "records",
        "list",
        "forecasts",
        "--workspace",
        &workspace_arg,
    ]);

    let guard = logging::init(&args).expect("first init succeeds");
    assert_eq!(guard.console_output(), ConsoleOutput::None);
    let log_path = guard.log_file_path().to_path_buf();
    assert!(log_path.ends_with(".bizflow/logs/bizflow.log"));

    tracing::info!(feature = "inventory-management", "logging smoke test");

    let second = logging::init(&args);
    assert!(second
        .err()
        .map(|err| err.to_string().contains("already initialized"))
        .unwrap_or(false));

    drop(guard);
    let contents = fs::read_to_string(&log_path).unwrap();
    assert!(contents.contains("logging smoke test"));
    assert!(contents.contains("inventory-management"));
}
