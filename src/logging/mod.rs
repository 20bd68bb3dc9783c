pub mod config;
pub mod context;
pub mod layers;

pub use context::{detect_context, ExecutionContext};
pub use layers::console::ConsoleOutput;

use crate::cli::Args;
use crate::logging::config::LoggingConfig;
use crate::logging::layers::{console, file, opentelemetry};
use crate::Result;
use anyhow::{anyhow, Context};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::Registry;

static LOGGER_INITIALIZED: AtomicBool = AtomicBool::new(false);

const VERBOSE_LEVEL: &str = "debug";

/// Guards that keep logging sinks active for the duration of the command.
pub struct LoggingGuard {
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
    otel_guard: Option<opentelemetry::OpenTelemetryHandle>,
    console_output: ConsoleOutput,
    log_file_path: PathBuf,
}

impl LoggingGuard {
    /// Returns the console output configuration used during initialization.
    pub fn console_output(&self) -> ConsoleOutput {
        self.console_output
    }

    /// Returns the log file path backed by the file sink.
    pub fn log_file_path(&self) -> &Path {
        &self.log_file_path
    }
}

impl Drop for LoggingGuard {
    fn drop(&mut self) {
        if let Some(handle) = self.otel_guard.take() {
            handle.shutdown();
        }
    }
}

/// Initialize logging for the parsed command line.
///
/// Sources apply in order: defaults, `.bizflow/config/logging.toml` in the
/// command's workspace, `BIZFLOW_LOG_*` and `OTEL_EXPORTER_OTLP_ENDPOINT`,
/// then `--verbose`. `RUST_LOG` replaces the level filter entirely. Errors
/// when called twice in one process.
pub fn init(args: &Args) -> Result<LoggingGuard> {
    if LOGGER_INITIALIZED
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Err(anyhow!("logging already initialized"));
    }

    let context = detect_context(args);
    let workspace_root = args.command.workspace_path();
    let mut config = LoggingConfig::load(workspace_root.as_deref())?;
    if args.verbose {
        config.default_level = VERBOSE_LEVEL.to_string();
    }

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.default_level))
        .context("failed to configure tracing level")?;
    let file_sink = file::FileSink::resolve(&config, workspace_root.as_deref())?;
    let log_file_path = file_sink.path();
    type BaseRegistry = Registry;
    type FileSubscriber = file::FileLayerStack<BaseRegistry>;
    type ConsoleSubscriber = console::ConsoleLayerStack<FileSubscriber>;

    let (file_layer, file_guard) = file_sink.layer::<BaseRegistry>(config.enable_file)?;
    let subscriber = tracing_subscriber::registry().with(file_layer);

    let console_output = console::select_console_output(context, config.console_output);
    let console_layer = console::console_layer::<FileSubscriber>(console_output);
    let subscriber = subscriber.with(console_layer);

    let mut otel_error = None;
    let (otel_layer, otel_handle) = if config.opentelemetry.enabled {
        match opentelemetry::init::<ConsoleSubscriber>(&config.opentelemetry) {
            Ok((layer, handle)) => (Some(layer), Some(handle)),
            Err(err) => {
                otel_error = Some(err);
                (None, None)
            }
        }
    } else {
        (None, None)
    };

    subscriber
        .with(otel_layer)
        .with(env_filter)
        .try_init()
        .context("failed to install tracing subscriber")?;

    if let Some(err) = otel_error {
        tracing::warn!("OpenTelemetry disabled: {:#}", err);
    }
    tracing::debug!(
        ?context,
        console = %console_output,
        log_file = %log_file_path.display(),
        "logging initialized"
    );

    Ok(LoggingGuard {
        _file_guard: file_guard,
        otel_guard: otel_handle,
        console_output,
        log_file_path,
    })
}

/// Reset the initialization guard so tests can reconfigure logging multiple times.
#[doc(hidden)]
pub fn reset_for_tests() {
    LOGGER_INITIALIZED.store(false, Ordering::SeqCst);
}
