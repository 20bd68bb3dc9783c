use bizflow::{cli, logging};
use clap::Parser;

#[tokio::main]
async fn main() -> bizflow::Result<()> {
    let args = cli::Args::parse();
    let _logging = logging::init(&args)?;

    let result = cli::run(args).await;
    if let Err(err) = &result {
        tracing::error!("{:#}", err);
    }
    result
}
