//! `in`: restore a bbl state directory from the bucket.

use bbl_state::cli::{init_tracing, read_request, write_response};
use bbl_state::concourse::InRequest;
use bbl_state::resource::run_in;
use bbl_state::StorageClient;
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "bbl-state-in", version, about = "Fetch a bbl state directory")]
struct Cli {
    /// Directory to restore the state into
    target_dir: PathBuf,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> anyhow::Result<()> {
    let request: InRequest = read_request()?;
    let client = StorageClient::from_source(&request.source).await?;
    let response = run_in(&client, &request, &cli.target_dir).await?;
    write_response(&response)
}
