use crate::core::types::OutputFormat;
use crate::features::FeatureKind;
use clap::Args;
use std::path::PathBuf;

#[derive(Args, Clone, Debug, Default)]
pub struct WorkspaceArgs {
    /// Directory holding bizflow.toml and the .bizflow state (default: current directory)
    #[arg(long, value_name = "PATH", help_heading = "Configuration")]
    pub workspace: Option<PathBuf>,

    /// Path to a custom config file (default: {workspace}/bizflow.toml)
    #[arg(long, value_name = "FILE", help_heading = "Configuration")]
    pub config: Option<PathBuf>,
}

#[derive(Args, Clone, Debug)]
pub struct FeaturesArgs {
    /// Emit a text table or machine-readable JSON
    #[arg(long, default_value = "text", value_name = "FORMAT")]
    pub format: ReportFormat,
}

#[derive(Args, Clone, Debug)]
pub struct RunArgs {
    /// Feature key, e.g. business-reporting (see `bizflow features`)
    #[arg(value_name = "FEATURE")]
    pub feature: FeatureKind,

    /// Document to upload and process
    #[arg(long, value_name = "FILE")]
    pub input: PathBuf,

    /// Mapping parameter as key=value; repeatable
    #[arg(long = "param", value_name = "KEY=VALUE", help_heading = "Mapping")]
    pub params: Vec<String>,

    /// Persist the result to the feature's table
    #[arg(long, help_heading = "Output Options")]
    pub save: bool,

    /// Emit a text summary or the raw result as JSON
    #[arg(long, default_value = "text", value_name = "FORMAT", help_heading = "Output Options")]
    pub format: ReportFormat,

    /// Process through the remote analytics endpoint instead of the built-in strategy
    #[arg(long, help_heading = "Processing")]
    pub remote: bool,

    /// Abort processing after this long, e.g. 30s (overrides processing.timeout)
    #[arg(long, value_name = "DURATION", help_heading = "Processing")]
    pub timeout: Option<String>,

    #[command(flatten)]
    pub location: WorkspaceArgs,
}

#[derive(Args, Clone, Debug)]
pub struct RecordsListArgs {
    /// Table to read, e.g. forecasts
    #[arg(value_name = "TABLE")]
    pub table: String,

    /// Only rows owned by this user id
    #[arg(long, value_name = "ID")]
    pub user: Option<String>,

    /// Return at most this many rows, newest first
    #[arg(long, value_name = "N")]
    pub limit: Option<usize>,

    #[command(flatten)]
    pub location: WorkspaceArgs,
}

#[derive(Args, Clone, Debug)]
pub struct RecordArgs {
    /// Table holding the record
    #[arg(value_name = "TABLE")]
    pub table: String,

    /// Record id
    #[arg(value_name = "ID")]
    pub id: String,

    #[command(flatten)]
    pub location: WorkspaceArgs,
}

#[derive(Clone, Copy, clap::ValueEnum, Debug, PartialEq, Eq)]
pub enum ReportFormat {
    /// Human-readable summary
    Text,
    /// JSON payload suitable for downstream tooling
    Json,
}

impl From<ReportFormat> for OutputFormat {
    fn from(format: ReportFormat) -> Self {
        match format {
            ReportFormat::Text => OutputFormat::Text,
            ReportFormat::Json => OutputFormat::Json,
        }
    }
}
