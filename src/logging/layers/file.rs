//! Non-blocking file sink for pipeline logs.

use crate::logging::config::{LogRotation, LoggingConfig};
use crate::Result;
use anyhow::{anyhow, Context};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use tracing::Subscriber;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::{self as tracing_fmt, format, writer::BoxMakeWriter};
use tracing_subscriber::registry::LookupSpan;

pub type FileFmtLayer<S> =
    tracing_fmt::Layer<S, format::DefaultFields, format::Format<format::Full>, BoxMakeWriter>;

pub type FileLayerStack<S> = tracing_subscriber::layer::Layered<FileFmtLayer<S>, S>;

const DEFAULT_LOG_DIR: &str = ".bizflow/logs";

/// Where pipeline logs are written: `file_name` inside `dir`, rolled per `rotation`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSink {
    dir: PathBuf,
    file_name: String,
    rotation: LogRotation,
}

impl FileSink {
    /// A relative `log_dir` is anchored at the workspace, or at `$HOME` when
    /// the command has no workspace, and may not climb out of it.
    pub fn resolve(config: &LoggingConfig, workspace_root: Option<&Path>) -> Result<Self> {
        let relative = config
            .log_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_DIR));

        let dir = if relative.is_absolute() {
            relative
        } else {
            if relative.components().any(|part| part == Component::ParentDir) {
                return Err(anyhow!(
                    "logging.log_dir '{}' must stay inside the workspace",
                    relative.display()
                ));
            }
            let anchor = match workspace_root {
                Some(workspace) => workspace.to_path_buf(),
                None => dirs_next::home_dir().ok_or_else(|| anyhow!("$HOME directory unavailable"))?,
            };
            anchor.join(relative)
        };

        Ok(Self {
            dir,
            file_name: config.file_name.clone(),
            rotation: config.rotation,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Base path of the log file; rolled files append a date to it.
    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }

    /// Fmt layer writing to this sink, or to a discarding writer when disabled.
    /// The guard must outlive the subscriber or buffered lines are lost.
    pub fn layer<S>(&self, enabled: bool) -> Result<(FileFmtLayer<S>, Option<WorkerGuard>)>
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        if !enabled {
            return Ok((plain_layer(BoxMakeWriter::new(io::sink)), None));
        }

        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create log directory {}", self.dir.display()))?;
        let appender = RollingFileAppender::builder()
            .rotation(rotation(self.rotation))
            .filename_prefix(&self.file_name)
            .build(&self.dir)
            .with_context(|| format!("failed to open log file {}", self.path().display()))?;

        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = plain_layer(BoxMakeWriter::new(writer));
        Ok((layer, Some(guard)))
    }
}

fn rotation(rotation: LogRotation) -> Rotation {
    match rotation {
        LogRotation::Never => Rotation::NEVER,
        LogRotation::Daily => Rotation::DAILY,
        LogRotation::Hourly => Rotation::HOURLY,
    }
}

fn plain_layer<S>(writer: BoxMakeWriter) -> FileFmtLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    tracing_fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
}
