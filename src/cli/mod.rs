pub mod args;
pub mod commands;

pub use args::{FeaturesArgs, RecordArgs, RecordsListArgs, ReportFormat, RunArgs, WorkspaceArgs};
use clap::{Parser, Subcommand};
use std::env;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{name} {version}\n\
{about-with-newline}\n\
USAGE:\n    {usage}\n\
\nOPTIONS:\n{options}\n\
COMMANDS:\n{subcommands}\n";

#[derive(Parser, Debug)]
#[command(name = "bizflow")]
#[command(version = crate::VERSION)]
#[command(about = "Business analytics pipelines from the command line")]
#[command(help_template = HELP_TEMPLATE)]
#[command(
    after_long_help = "Typical flow: list features, run one against a document with --save, then browse the stored records."
)]
pub struct Args {
    /// Log at debug level
    #[arg(long, global = true)]
    pub verbose: bool,

    /// Disable console logging
    #[arg(long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    #[command(
        about = "List the available features",
        long_about = "Features prints every pipeline with its key, record table and accepted upload types.",
        after_help = "Example:\n    bizflow features --format json"
    )]
    Features(FeaturesArgs),
    #[command(
        about = "Drive a feature pipeline over a document",
        long_about = "Run uploads the document, maps it with the given parameters, processes it, prints the summary and optionally saves the result.",
        after_help = "Example:\n    bizflow run business-reporting --input sales.csv --param aggregation=weekly --save"
    )]
    Run(RunArgs),
    #[command(
        subcommand,
        about = "Browse or delete saved results",
        long_about = "Records reads the configured record store: list a table, show one row or delete it.",
        after_help = "Examples:\n    bizflow records list forecasts --limit 5\n    bizflow records delete forecasts <ID>"
    )]
    Records(RecordsCommand),
}

#[derive(Subcommand, Debug)]
pub enum RecordsCommand {
    /// List rows of a table, newest first
    List(RecordsListArgs),
    /// Print one row as JSON
    Show(RecordArgs),
    /// Delete one row
    Delete(RecordArgs),
}

impl Command {
    /// Workspace the command operates on, used to locate config and logs.
    pub fn workspace_path(&self) -> Option<PathBuf> {
        let location = match self {
            Command::Features(_) => None,
            Command::Run(args) => Some(&args.location),
            Command::Records(RecordsCommand::List(args)) => Some(&args.location),
            Command::Records(RecordsCommand::Show(args))
            | Command::Records(RecordsCommand::Delete(args)) => Some(&args.location),
        };
        location
            .and_then(|location| location.workspace.clone())
            .or_else(|| env::current_dir().ok())
    }
}

pub async fn run(args: Args) -> crate::Result<()> {
    match args.command {
        Command::Features(features_args) => commands::features(features_args).await,
        Command::Run(run_args) => commands::run(run_args).await,
        Command::Records(RecordsCommand::List(list_args)) => commands::records_list(list_args).await,
        Command::Records(RecordsCommand::Show(show_args)) => commands::records_show(show_args).await,
        Command::Records(RecordsCommand::Delete(delete_args)) => {
            commands::records_delete(delete_args).await
        }
    }
}
